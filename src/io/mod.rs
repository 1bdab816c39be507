//! I/O for water-level records and fitted component reports.
//!
//! This module provides:
//! - **Series ingestion**: delimited text to a [`TimeSeries`](crate::analysis::TimeSeries),
//!   with either calendar timestamps or numeric time columns
//! - **Component reports**: a fitted model written as text and read back
//!
//! # File Formats
//!
//! ## Water-level records
//!
//! ```text
//! 01/01/2024 00:00:00;1.52
//! 01/01/2024 01:00:00;1.87
//! ```
//!
//! ## Component reports
//!
//! ```text
//! # epoch: 01/01/2024 00:00:00
//! # mean: 1.250000000
//! # columns: name pulsation(rad/h) amplitude(m) phase(rad)
//! M2 0.505868100 1.192050000 0.301000000
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use tide_harmonics::io::{ReaderConfig, read_series_file, write_component_report};
//!
//! let config = ReaderConfig::default().with_separator(',').with_format_or_units("1/60");
//! let parsed = read_series_file(Path::new("gauge.csv"), &config)?;
//! println!("{} rows, {} skipped", parsed.series.len(), parsed.skipped.len());
//! ```

mod report;
mod timeseries_reader;

pub use report::{
    ComponentReport, ReportError, parse_component_report, read_component_report_file,
    write_component_report, write_component_report_file,
};
pub use timeseries_reader::{
    DEFAULT_TIME_FORMAT, OrderPolicy, ParsedSeries, ReadError, ReaderConfig, RowError,
    SkippedRow, TimeEncoding, parse_timestamp, read_series, read_series_bytes, read_series_file,
};
