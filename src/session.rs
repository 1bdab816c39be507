//! Analysis session: the current series and model, with buffers held in a
//! [`BufferArena`].
//!
//! The session is what the foreign boundary drives. Re-ingestion releases the
//! previous series buffers before the new ones are stored, and re-fitting
//! replaces the previous model, so repeated reads never grow the arena.
//! Series buffers are pinned: a caller holding a guessed handle cannot
//! release them out from under the session.
//!
//! ```ignore
//! let mut session = Session::new();
//! session.ingest(text.as_bytes(), &ReaderConfig::default())?;
//! session.fit_table(&ConstituentTable::principal(), 0, session.len())?;
//! let worst = session.error_inf(0, session.len())?;
//! ```

use tracing::debug;

use crate::analysis::{
    self, Epoch, FitConfig, HarmonicAnalysis, HarmonicFit, HarmonicModel, ResidualMetrics,
    SeriesError, error_inf, error_mean, synthesize,
};
use crate::arena::{BufferArena, BufferHandle};
use crate::constituents::ConstituentTable;
use crate::error::{Error, Result, Stage};
use crate::io::{ParsedSeries, ReaderConfig, read_series_bytes, write_component_report};

#[derive(Debug)]
struct SeriesBuffers {
    time: BufferHandle,
    height: BufferHandle,
    len: usize,
    mean: f64,
    epoch: Epoch,
    skipped: usize,
}

#[derive(Debug)]
struct FittedModel {
    fit: HarmonicFit,
    names: Option<Vec<String>>,
}

/// Owner of the ingested series, the fitted model and all exported buffers.
#[derive(Debug, Default)]
pub struct Session {
    arena: BufferArena,
    fit_config: FitConfig,
    series: Option<SeriesBuffers>,
    model: Option<FittedModel>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default solver configuration for subsequent fits.
    pub fn with_fit_config(mut self, config: FitConfig) -> Self {
        self.fit_config = config;
        self
    }

    /// Buffers owned by this session.
    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// Mutable access for callers that allocate their own buffers.
    pub fn arena_mut(&mut self) -> &mut BufferArena {
        &mut self.arena
    }

    /// Parse `text` and make it the current series. Returns the point count.
    ///
    /// The previous series buffers are released first and any fitted model
    /// is discarded. If the text cannot be parsed the current series is kept.
    pub fn ingest(&mut self, text: &[u8], config: &ReaderConfig) -> Result<usize> {
        let parsed = read_series_bytes(text, config);
        self.install(parsed?)
    }

    /// [`Session::ingest`] from a byte buffer in the session's arena.
    pub fn ingest_buffer(&mut self, text: BufferHandle, config: &ReaderConfig) -> Result<usize> {
        let parsed = read_series_bytes(self.arena.bytes(text)?, config);
        self.install(parsed?)
    }

    fn install(&mut self, parsed: ParsedSeries) -> Result<usize> {
        self.clear()?;

        let skipped = parsed.skipped.len();
        let (time, height, mean, epoch) = parsed.series.into_parts();
        let len = time.len();
        let time = self.arena.insert_pinned_f64(time)?;
        let height = match self.arena.insert_pinned_f64(height) {
            Ok(h) => h,
            Err(e) => {
                self.arena.release_pinned(time)?;
                return Err(e.into());
            }
        };

        debug!(len, skipped, mean, %epoch, "session series installed");
        self.series = Some(SeriesBuffers {
            time,
            height,
            len,
            mean,
            epoch,
            skipped,
        });
        Ok(len)
    }

    /// Release the current series and model, if any.
    ///
    /// Both series buffers are released even if the first release fails; the
    /// first error is then returned.
    pub fn clear(&mut self) -> Result<()> {
        self.model = None;
        if let Some(old) = self.series.take() {
            let time = self.arena.release_pinned(old.time);
            let height = self.arena.release_pinned(old.height);
            time.and(height)?;
        }
        Ok(())
    }

    fn series(&self, stage: Stage) -> Result<&SeriesBuffers> {
        self.series.as_ref().ok_or(Error::NotReady {
            stage,
            missing: "an ingested series",
        })
    }

    /// Whether a series is loaded.
    pub fn has_series(&self) -> bool {
        self.series.is_some()
    }

    /// Number of samples in the current series (0 if none).
    pub fn len(&self) -> usize {
        self.series.as_ref().map_or(0, |s| s.len)
    }

    /// Whether the session holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows skipped while reading the current series.
    pub fn skipped_rows(&self) -> usize {
        self.series.as_ref().map_or(0, |s| s.skipped)
    }

    /// Times in hours since the epoch.
    pub fn times(&self) -> Result<&[f64]> {
        let s = self.series(Stage::Ingest)?;
        Ok(self.arena.f64(s.time)?)
    }

    /// Heights.
    pub fn heights(&self) -> Result<&[f64]> {
        let s = self.series(Stage::Ingest)?;
        Ok(self.arena.f64(s.height)?)
    }

    /// Mean of all heights.
    pub fn mean(&self) -> Result<f64> {
        Ok(self.series(Stage::Ingest)?.mean)
    }

    /// Epoch of the current series.
    pub fn epoch(&self) -> Result<&Epoch> {
        Ok(&self.series(Stage::Ingest)?.epoch)
    }

    /// Multiply all heights by `factor` and recompute the mean.
    pub fn scale_heights(&mut self, factor: f64) -> Result<()> {
        if !factor.is_finite() || factor == 0.0 {
            return Err(SeriesError::InvalidScale(factor).into());
        }
        let handle = self.series(Stage::Ingest)?.height;
        let heights = self.arena.f64_mut(handle)?;
        for h in heights.iter_mut() {
            *h *= factor;
        }
        let mean = analysis::mean(heights);
        if let Some(series) = self.series.as_mut() {
            series.mean = mean;
        }
        Ok(())
    }

    fn window(&self, lo: usize, hi: usize, stage: Stage) -> Result<(&[f64], &[f64])> {
        let s = self.series(stage)?;
        if lo >= hi || hi > s.len {
            return Err(SeriesError::InvalidRange { lo, hi, len: s.len }.into());
        }
        let time = self.arena.f64(s.time)?;
        let height = self.arena.f64(s.height)?;
        Ok((&time[lo..hi], &height[lo..hi]))
    }

    /// Fit `pulsations` over samples `[lo, hi)` against the full-series mean.
    pub fn fit(&mut self, pulsations: &[f64], lo: usize, hi: usize) -> Result<&HarmonicFit> {
        let analysis = HarmonicAnalysis::new(pulsations.to_vec()).with_config(self.fit_config);
        self.fit_with(analysis, None, lo, hi)
    }

    /// Fit the constituents of `table`, remembering their names for reports.
    pub fn fit_table(
        &mut self,
        table: &ConstituentTable,
        lo: usize,
        hi: usize,
    ) -> Result<&HarmonicFit> {
        let analysis = HarmonicAnalysis::from_table(table).with_config(self.fit_config);
        let names = table.names().into_iter().map(String::from).collect();
        self.fit_with(analysis, Some(names), lo, hi)
    }

    fn fit_with(
        &mut self,
        analysis: HarmonicAnalysis,
        names: Option<Vec<String>>,
        lo: usize,
        hi: usize,
    ) -> Result<&HarmonicFit> {
        self.model = None;
        let mean = self.series(Stage::Fit)?.mean;
        let (time, height) = self.window(lo, hi, Stage::Fit)?;
        let fit = analysis.fit(time, height, mean)?;

        let fitted = self.model.insert(FittedModel { fit, names });
        Ok(&fitted.fit)
    }

    /// Replace the model, e.g. with one read from a component report.
    pub fn set_model(&mut self, model: HarmonicModel, names: Option<Vec<String>>) {
        let rank = HarmonicAnalysis::new(model.pulsations().to_vec()).expected_rank();
        self.model = Some(FittedModel {
            fit: HarmonicFit {
                model,
                rank,
                expected_rank: rank,
                condition_number: f64::NAN,
            },
            names,
        });
    }

    fn fitted(&self, stage: Stage) -> Result<&FittedModel> {
        self.model.as_ref().ok_or(Error::NotReady {
            stage,
            missing: "a fitted model",
        })
    }

    /// Current model.
    pub fn model(&self) -> Result<&HarmonicModel> {
        Ok(&self.fitted(Stage::Fit)?.fit.model)
    }

    /// Predicted heights at `times`.
    pub fn synthesize(&self, times: &[f64]) -> Result<Vec<f64>> {
        let model = &self.fitted(Stage::Synthesize)?.fit.model;
        Ok(synthesize(times, model)?)
    }

    /// Maximum absolute residual over `[lo, hi)`.
    pub fn error_inf(&self, lo: usize, hi: usize) -> Result<f64> {
        let model = &self.fitted(Stage::Metrics)?.fit.model;
        let (time, height) = self.window(lo, hi, Stage::Metrics)?;
        Ok(error_inf(time, height, model)?)
    }

    /// Mean absolute residual over `[lo, hi)`.
    pub fn error_mean(&self, lo: usize, hi: usize) -> Result<f64> {
        let model = &self.fitted(Stage::Metrics)?.fit.model;
        let (time, height) = self.window(lo, hi, Stage::Metrics)?;
        Ok(error_mean(time, height, model)?)
    }

    /// All residual statistics over `[lo, hi)`.
    pub fn metrics(&self, lo: usize, hi: usize) -> Result<ResidualMetrics> {
        let model = &self.fitted(Stage::Metrics)?.fit.model;
        let (time, height) = self.window(lo, hi, Stage::Metrics)?;
        Ok(ResidualMetrics::compute(time, height, model)?)
    }

    /// Component report for the current model and epoch.
    ///
    /// Components fitted without a table are named `W1`, `W2`, ...
    pub fn report(&self) -> Result<String> {
        let fitted = self.fitted(Stage::Report)?;
        let epoch = self.series(Stage::Report)?.epoch.clone();
        let generated: Vec<String>;
        let names: Vec<&str> = match &fitted.names {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => {
                generated = (1..=fitted.fit.model.len()).map(|i| format!("W{i}")).collect();
                generated.iter().map(String::as_str).collect()
            }
        };
        Ok(write_component_report(&epoch, &names, &fitted.fit.model)?)
    }

    fn export(&mut self, data: Vec<f64>) -> Result<BufferHandle> {
        Ok(self.arena.insert_f64(data)?)
    }

    /// Copy of the series times in a fresh buffer owned by the caller.
    pub fn export_times(&mut self) -> Result<BufferHandle> {
        let data = self.times()?.to_vec();
        self.export(data)
    }

    /// Copy of the series heights in a fresh buffer owned by the caller.
    pub fn export_heights(&mut self) -> Result<BufferHandle> {
        let data = self.heights()?.to_vec();
        self.export(data)
    }

    /// Model amplitudes in a fresh buffer owned by the caller.
    pub fn export_amplitudes(&mut self) -> Result<BufferHandle> {
        let data = self.model()?.amplitudes().to_vec();
        self.export(data)
    }

    /// Model phases in a fresh buffer owned by the caller.
    pub fn export_phases(&mut self) -> Result<BufferHandle> {
        let data = self.model()?.phases().to_vec();
        self.export(data)
    }

    /// Synthesize at the times held in `times` into a fresh buffer.
    pub fn synthesize_buffer(&mut self, times: BufferHandle) -> Result<BufferHandle> {
        let predicted = self.synthesize(self.arena.f64(times)?)?;
        self.export(predicted)
    }
}
