//! Handle-based buffer arena for data crossing the foreign boundary.
//!
//! Buffers are addressed by [`BufferHandle`], a non-zero `u64` packing a slot
//! index and a generation counter. A slot's generation is bumped each time it
//! is reused, so a handle kept past its release is told apart from the
//! buffer that now occupies the slot:
//! - same generation, slot empty: the buffer was already released
//! - different generation: the handle is stale
//!
//! Buffers inserted as pinned belong to the arena's owner and refuse a plain
//! [`BufferArena::release`]; only [`BufferArena::release_pinned`] frees them.
//!
//! Misuse never touches freed memory; it returns an [`ArenaError`] and logs at
//! `error` level. Dropping an arena that still owns buffers logs a warning.

use std::fmt;
use std::num::NonZeroU64;

use thiserror::Error;
use tracing::{debug, error, warn};

/// Element type of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// 64-bit floats
    F64,
    /// Raw bytes (text input)
    Bytes,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::F64 => f.write_str("f64"),
            BufferKind::Bytes => f.write_str("bytes"),
        }
    }
}

/// Error type for arena operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArenaError {
    /// Handle was never issued by this arena
    #[error("Invalid buffer handle {0:#x}")]
    InvalidHandle(u64),

    /// Buffer was already released
    #[error("Buffer {0} was already released")]
    Released(BufferHandle),

    /// Slot has been reused since the handle was issued
    #[error("Stale buffer handle {0}")]
    Stale(BufferHandle),

    /// Buffer is pinned by its owner
    #[error("Buffer {0} is pinned and cannot be released by the caller")]
    Pinned(BufferHandle),

    /// Buffer holds a different element type
    #[error("Buffer {handle} holds {actual}, expected {expected}")]
    KindMismatch {
        handle: BufferHandle,
        expected: BufferKind,
        actual: BufferKind,
    },

    /// Allocation could not be satisfied
    #[error("Cannot allocate {len} elements")]
    AllocationFailed { len: usize },

    /// Slot table is full
    #[error("Buffer arena exhausted")]
    Exhausted,
}

/// Opaque handle to an arena buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(NonZeroU64);

impl BufferHandle {
    fn new(index: usize, generation: u32) -> Option<Self> {
        let slot = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU64::new(((generation as u64) << 32) | slot as u64).map(Self)
    }

    /// Rebuild a handle from its integer form.
    ///
    /// `None` when the slot field (low 32 bits) is 0, which no issued handle
    /// ever has.
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw & 0xFFFF_FFFF == 0 {
            return None;
        }
        NonZeroU64::new(raw).map(Self)
    }

    /// Integer form passed across the boundary.
    pub fn raw(self) -> u64 {
        self.0.get()
    }

    fn index(self) -> usize {
        // Slot field is non-zero for every constructed handle
        ((self.0.get() & 0xFFFF_FFFF).saturating_sub(1)) as usize
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index(), self.generation())
    }
}

#[derive(Debug)]
enum Storage {
    F64(Vec<f64>),
    Bytes(Vec<u8>),
}

impl Storage {
    fn kind(&self) -> BufferKind {
        match self {
            Storage::F64(_) => BufferKind::F64,
            Storage::Bytes(_) => BufferKind::Bytes,
        }
    }

    fn len(&self) -> usize {
        match self {
            Storage::F64(v) => v.len(),
            Storage::Bytes(v) => v.len(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    storage: Option<Storage>,
    pinned: bool,
}

/// Owner of every buffer handed across the boundary.
#[derive(Debug, Default)]
pub struct BufferArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

fn zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, ArenaError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| ArenaError::AllocationFailed { len })?;
    v.resize(len, T::default());
    Ok(v)
}

impl BufferArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-filled f64 buffer.
    pub fn alloc_f64(&mut self, len: usize) -> Result<BufferHandle, ArenaError> {
        let data = zeroed::<f64>(len)?;
        self.insert(Storage::F64(data))
    }

    /// Allocate a zero-filled byte buffer.
    pub fn alloc_bytes(&mut self, len: usize) -> Result<BufferHandle, ArenaError> {
        let data = zeroed::<u8>(len)?;
        self.insert(Storage::Bytes(data))
    }

    /// Move an existing f64 vector into the arena.
    pub fn insert_f64(&mut self, data: Vec<f64>) -> Result<BufferHandle, ArenaError> {
        self.insert(Storage::F64(data))
    }

    /// Move an existing byte vector into the arena.
    pub fn insert_bytes(&mut self, data: Vec<u8>) -> Result<BufferHandle, ArenaError> {
        self.insert(Storage::Bytes(data))
    }

    /// Move an f64 vector into the arena as a pinned buffer.
    pub fn insert_pinned_f64(&mut self, data: Vec<f64>) -> Result<BufferHandle, ArenaError> {
        let handle = self.insert(Storage::F64(data))?;
        self.slots[handle.index()].pinned = true;
        Ok(handle)
    }

    fn insert(&mut self, storage: Storage) -> Result<BufferHandle, ArenaError> {
        let kind = storage.kind();
        let len = storage.len();

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    storage: None,
                    pinned: false,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        let Some(handle) = BufferHandle::new(index, slot.generation) else {
            self.free.push(index);
            return Err(ArenaError::Exhausted);
        };
        slot.storage = Some(storage);
        slot.pinned = false;
        self.live += 1;

        debug!(%handle, %kind, len, "allocated buffer");
        Ok(handle)
    }

    fn slot(&self, handle: BufferHandle) -> Result<&Storage, ArenaError> {
        let result = match self.slots.get(handle.index()) {
            None => Err(ArenaError::InvalidHandle(handle.raw())),
            Some(slot) if slot.generation != handle.generation() => {
                Err(ArenaError::Stale(handle))
            }
            Some(slot) => slot.storage.as_ref().ok_or(ArenaError::Released(handle)),
        };
        result.inspect_err(|e| error!(%handle, "buffer misuse: {e}"))
    }

    fn slot_mut(&mut self, handle: BufferHandle) -> Result<&mut Storage, ArenaError> {
        let result = match self.slots.get_mut(handle.index()) {
            None => Err(ArenaError::InvalidHandle(handle.raw())),
            Some(slot) if slot.generation != handle.generation() => {
                Err(ArenaError::Stale(handle))
            }
            Some(slot) => slot.storage.as_mut().ok_or(ArenaError::Released(handle)),
        };
        result.inspect_err(|e| error!(%handle, "buffer misuse: {e}"))
    }

    fn kind_mismatch(handle: BufferHandle, expected: BufferKind, actual: BufferKind) -> ArenaError {
        let e = ArenaError::KindMismatch {
            handle,
            expected,
            actual,
        };
        error!(%handle, "buffer misuse: {e}");
        e
    }

    /// Element type of a live buffer.
    pub fn kind(&self, handle: BufferHandle) -> Result<BufferKind, ArenaError> {
        Ok(self.slot(handle)?.kind())
    }

    /// Element count of a live buffer.
    pub fn len(&self, handle: BufferHandle) -> Result<usize, ArenaError> {
        Ok(self.slot(handle)?.len())
    }

    /// Whether a live buffer is pinned.
    pub fn is_pinned(&self, handle: BufferHandle) -> Result<bool, ArenaError> {
        self.slot(handle)?;
        Ok(self.slots[handle.index()].pinned)
    }

    /// Whether the handle refers to a live buffer. Does not log.
    pub fn contains(&self, handle: BufferHandle) -> bool {
        self.slots.get(handle.index()).is_some_and(|slot| {
            slot.generation == handle.generation() && slot.storage.is_some()
        })
    }

    /// Read an f64 buffer.
    pub fn f64(&self, handle: BufferHandle) -> Result<&[f64], ArenaError> {
        match self.slot(handle)? {
            Storage::F64(v) => Ok(v),
            other => Err(Self::kind_mismatch(handle, BufferKind::F64, other.kind())),
        }
    }

    /// Write access to an f64 buffer.
    pub fn f64_mut(&mut self, handle: BufferHandle) -> Result<&mut [f64], ArenaError> {
        match self.slot_mut(handle)? {
            Storage::F64(v) => Ok(v),
            other => {
                let actual = other.kind();
                Err(Self::kind_mismatch(handle, BufferKind::F64, actual))
            }
        }
    }

    /// Read a byte buffer.
    pub fn bytes(&self, handle: BufferHandle) -> Result<&[u8], ArenaError> {
        match self.slot(handle)? {
            Storage::Bytes(v) => Ok(v),
            other => Err(Self::kind_mismatch(handle, BufferKind::Bytes, other.kind())),
        }
    }

    /// Write access to a byte buffer.
    pub fn bytes_mut(&mut self, handle: BufferHandle) -> Result<&mut [u8], ArenaError> {
        match self.slot_mut(handle)? {
            Storage::Bytes(v) => Ok(v),
            other => {
                let actual = other.kind();
                Err(Self::kind_mismatch(handle, BufferKind::Bytes, actual))
            }
        }
    }

    /// Free a buffer. A second release of the same handle is an error, and so
    /// is releasing a pinned buffer.
    pub fn release(&mut self, handle: BufferHandle) -> Result<(), ArenaError> {
        self.take(handle, false).map(|_| ())
    }

    /// Free a buffer whether or not it is pinned.
    pub fn release_pinned(&mut self, handle: BufferHandle) -> Result<(), ArenaError> {
        self.take(handle, true).map(|_| ())
    }

    /// Release an f64 buffer and return its contents.
    pub fn take_f64(&mut self, handle: BufferHandle) -> Result<Vec<f64>, ArenaError> {
        let actual = self.kind(handle)?;
        if actual != BufferKind::F64 {
            return Err(Self::kind_mismatch(handle, BufferKind::F64, actual));
        }
        match self.take(handle, false)? {
            Storage::F64(v) => Ok(v),
            Storage::Bytes(_) => Err(Self::kind_mismatch(handle, BufferKind::F64, actual)),
        }
    }

    fn take(&mut self, handle: BufferHandle, unpin: bool) -> Result<Storage, ArenaError> {
        self.slot(handle)?;
        let slot = &mut self.slots[handle.index()];
        if slot.pinned && !unpin {
            let e = ArenaError::Pinned(handle);
            error!(%handle, "buffer misuse: {e}");
            return Err(e);
        }
        let storage = slot.storage.take().ok_or(ArenaError::Released(handle))?;
        slot.pinned = false;
        self.free.push(handle.index());
        self.live -= 1;
        debug!(%handle, "released buffer");
        Ok(storage)
    }

    /// Number of live buffers.
    pub fn live_count(&self) -> usize {
        self.live
    }
}

impl Drop for BufferArena {
    fn drop(&mut self) {
        if self.live > 0 {
            warn!(live = self.live, "buffer arena dropped with live buffers");
        }
    }
}
