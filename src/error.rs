//! Crate-level error carrying the pipeline stage that failed.

use std::fmt;

use thiserror::Error;

use crate::analysis::{FitError, MetricsError, SeriesError, SynthesisError};
use crate::arena::ArenaError;
use crate::constituents::ConstituentError;
use crate::io::{ReadError, ReportError};

/// Pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Fit,
    Synthesize,
    Metrics,
    Buffer,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Fit => "fit",
            Stage::Synthesize => "synthesize",
            Stage::Metrics => "metrics",
            Stage::Buffer => "buffer",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Any failure from the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Constituent(#[from] ConstituentError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Buffer(#[from] ArenaError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// Operation needs state that has not been produced yet
    #[error("{stage} requires {missing}")]
    NotReady {
        stage: Stage,
        missing: &'static str,
    },
}

impl Error {
    /// Stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Error::Read(_) | Error::Series(_) => Stage::Ingest,
            Error::Constituent(_) | Error::Fit(_) => Stage::Fit,
            Error::Synthesis(_) => Stage::Synthesize,
            Error::Metrics(_) => Stage::Metrics,
            Error::Buffer(_) => Stage::Buffer,
            Error::Report(_) => Stage::Report,
            Error::NotReady { stage, .. } => *stage,
        }
    }

    /// Message prefixed with the stage, as shown to foreign callers.
    pub fn staged_message(&self) -> String {
        format!("{}: {}", self.stage(), self)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
