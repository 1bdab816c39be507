//! # tide-harmonics
//!
//! Tidal harmonic analysis of water-level records.
//!
//! This crate provides:
//! - Ingestion of delimited text into a uniform time series (hours since an
//!   epoch), with calendar timestamps or numeric time columns
//! - Least-squares fitting of amplitude and phase for a fixed set of
//!   pulsations
//! - Synthesis of predicted heights from a fitted model
//! - Residual error metrics
//! - A named constituent table (M2, S2, K1, ...)
//! - A handle-based buffer arena and C ABI for foreign hosts
//!
//! Phase convention: a fitted component contributes `H·cos(ωt + φ)`, with
//! `φ = atan2(-b, a)` from the cosine/sine coefficients `a`, `b`.

pub mod analysis;
pub mod arena;
pub mod constituents;
pub mod error;
pub mod ffi;
pub mod io;
pub mod session;

pub use analysis::{
    Epoch, FitConfig, FitError, HarmonicAnalysis, HarmonicFit, HarmonicModel, ResidualMetrics,
    SeriesView, TimeSeries, error_inf, error_mean, error_sum_squares, synthesize,
    synthesize_components,
};
pub use arena::{ArenaError, BufferArena, BufferHandle, BufferKind};
pub use constituents::{Constituent, ConstituentError, ConstituentTable, MEAN_TERM};
pub use error::{Error, Result, Stage};
pub use io::{
    OrderPolicy, ParsedSeries, ReadError, ReaderConfig, TimeEncoding, parse_component_report,
    read_series, read_series_file, write_component_report,
};
pub use session::Session;
