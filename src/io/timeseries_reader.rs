//! Reader for delimited water-level records.
//!
//! Parses row-oriented text into a [`TimeSeries`] of hours since an epoch
//! and heights.
//!
//! # File Format
//!
//! ```text
//! # Station 95, hourly heights
//! 01/01/2024 00:00:00;1.52;raw
//! 01/01/2024 01:00:00;1.87;raw
//! 01/01/2024 02:00:00;2.03;validated
//! ```
//!
//! Fields are split on a single separator character; the time and height
//! columns are 0-based indices. The time column is interpreted according to
//! a [`TimeEncoding`]:
//! - `Pattern(format)`: strptime-style timestamp, elapsed hours since the
//!   first valid row
//! - `ScaleFactor(k)`: numeric value multiplied by `k` to give hours
//!
//! Blank lines and lines starting with `#` are ignored. Rows that cannot be
//! parsed are skipped and reported in [`ParsedSeries::skipped`]; they never
//! abort the read.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{Epoch, SeriesError, TimeSeries};

/// Timestamp format used when none is given.
pub const DEFAULT_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Error type for series ingestion.
#[derive(Debug, Error)]
pub enum ReadError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// No row could be parsed
    #[error("No valid rows ({skipped} skipped)")]
    NoValidRows { skipped: usize },

    /// Time decreases at the given line and the order policy rejects it
    #[error("Non-monotonic time at line {line}")]
    NonMonotonic { line: usize },

    /// Reader options that cannot produce a valid series
    #[error("Invalid reader configuration: {0}")]
    InvalidConfig(String),

    /// Parsed samples violate a series invariant
    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Why a single row was skipped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowError {
    /// Row has too few fields
    #[error("missing column {column} (row has {fields} fields)")]
    MissingField { column: usize, fields: usize },

    /// Time field does not match the timestamp pattern
    #[error("timestamp {value:?} does not match {format:?}")]
    InvalidTimestamp { value: String, format: String },

    /// Field is not a number
    #[error("column {column}: {value:?} is not a number")]
    InvalidNumber { column: usize, value: String },

    /// Field parsed to NaN or infinity
    #[error("column {column} is not finite")]
    NonFinite { column: usize },
}

/// A row left out of the series.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedRow {
    /// 1-based line number
    pub line: usize,
    /// Reason
    pub error: RowError,
}

/// How the time column is interpreted.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeEncoding {
    /// strptime-style calendar pattern
    Pattern(String),
    /// Numeric time multiplied by this many hours per raw unit
    ScaleFactor(f64),
}

impl TimeEncoding {
    /// Decide the encoding from a user-supplied "format or units" string.
    ///
    /// - contains `%`: pattern
    /// - a finite number or a fraction `a/b`: scale factor (hours per unit)
    /// - anything else (including empty): the default pattern
    pub fn from_format_or_units(value: &str) -> Self {
        let value = value.trim();
        if value.contains('%') {
            return TimeEncoding::Pattern(value.to_string());
        }
        match parse_number_or_fraction(value) {
            Some(units) => TimeEncoding::ScaleFactor(units),
            None => TimeEncoding::Pattern(DEFAULT_TIME_FORMAT.to_string()),
        }
    }
}

impl Default for TimeEncoding {
    fn default() -> Self {
        TimeEncoding::Pattern(DEFAULT_TIME_FORMAT.to_string())
    }
}

fn parse_number_or_fraction(value: &str) -> Option<f64> {
    let parsed = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            num / den
        }
        None => value.parse().ok()?,
    };
    parsed.is_finite().then_some(parsed)
}

/// What to do with rows whose time goes backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Stable sort by time
    #[default]
    Sort,
    /// Fail with [`ReadError::NonMonotonic`]
    Reject,
}

/// Reader options.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderConfig {
    /// Field separator
    pub separator: char,
    /// 0-based time column
    pub time_column: usize,
    /// 0-based height column
    pub height_column: usize,
    /// Time column interpretation
    pub encoding: TimeEncoding,
    /// Multiplier applied to every height after reading (e.g. 0.01 for cm)
    pub height_scale: f64,
    /// Handling of out-of-order rows
    pub order: OrderPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            separator: ';',
            time_column: 0,
            height_column: 1,
            encoding: TimeEncoding::default(),
            height_scale: 1.0,
            order: OrderPolicy::default(),
        }
    }
}

impl ReaderConfig {
    /// Set the field separator.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Set the time and height columns.
    pub fn with_columns(mut self, time_column: usize, height_column: usize) -> Self {
        self.time_column = time_column;
        self.height_column = height_column;
        self
    }

    /// Set the time encoding.
    pub fn with_encoding(mut self, encoding: TimeEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the time encoding from a "format or units" string.
    pub fn with_format_or_units(self, value: &str) -> Self {
        self.with_encoding(TimeEncoding::from_format_or_units(value))
    }

    /// Set the height multiplier.
    pub fn with_height_scale(mut self, scale: f64) -> Self {
        self.height_scale = scale;
        self
    }

    /// Set the order policy.
    pub fn with_order(mut self, order: OrderPolicy) -> Self {
        self.order = order;
        self
    }

    fn validate(&self) -> Result<(), ReadError> {
        if self.time_column == self.height_column {
            return Err(ReadError::InvalidConfig(format!(
                "time and height share column {}",
                self.time_column
            )));
        }
        if let TimeEncoding::ScaleFactor(k) = self.encoding {
            if !k.is_finite() || k <= 0.0 {
                return Err(ReadError::InvalidConfig(format!(
                    "time scale factor must be positive, got {k}"
                )));
            }
        }
        if !self.height_scale.is_finite() || self.height_scale == 0.0 {
            return Err(ReadError::InvalidConfig(format!(
                "height scale must be finite and non-zero, got {}",
                self.height_scale
            )));
        }
        Ok(())
    }
}

/// Result of a read: the series plus what was left out.
#[derive(Clone, Debug)]
pub struct ParsedSeries {
    /// The ingested series
    pub series: TimeSeries,
    /// Rows that failed to parse
    pub skipped: Vec<SkippedRow>,
    /// Whether rows had to be reordered by time
    pub reordered: bool,
}

fn field<'a>(fields: &[&'a str], column: usize) -> Result<&'a str, RowError> {
    fields
        .get(column)
        .map(|f| f.trim())
        .ok_or(RowError::MissingField {
            column,
            fields: fields.len(),
        })
}

fn parse_number(value: &str, column: usize) -> Result<f64, RowError> {
    let parsed: f64 = value.parse().map_err(|_| RowError::InvalidNumber {
        column,
        value: value.to_string(),
    })?;
    if !parsed.is_finite() {
        return Err(RowError::NonFinite { column });
    }
    Ok(parsed)
}

/// Parse a timestamp, accepting date-only patterns as midnight.
pub fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parsed time field before conversion to hours.
enum RawTime {
    Instant(NaiveDateTime, String),
    Value(f64),
}

fn parse_row(line: &str, config: &ReaderConfig) -> Result<(RawTime, f64), RowError> {
    let fields: Vec<&str> = line.split(config.separator).collect();
    let time_field = field(&fields, config.time_column)?;
    let height_field = field(&fields, config.height_column)?;

    let time = match &config.encoding {
        TimeEncoding::Pattern(format) => {
            let instant =
                parse_timestamp(time_field, format).ok_or_else(|| RowError::InvalidTimestamp {
                    value: time_field.to_string(),
                    format: format.clone(),
                })?;
            RawTime::Instant(instant, time_field.to_string())
        }
        TimeEncoding::ScaleFactor(_) => RawTime::Value(parse_number(time_field, config.time_column)?),
    };
    let height = parse_number(height_field, config.height_column)?;
    Ok((time, height))
}

/// Parse a series from text.
///
/// # Errors
/// - `NoValidRows` if no row parses
/// - `NonMonotonic` if time decreases and the policy is [`OrderPolicy::Reject`]
/// - `InvalidConfig` for unusable options
pub fn read_series(content: &str, config: &ReaderConfig) -> Result<ParsedSeries, ReadError> {
    config.validate()?;

    let mut epoch: Option<Epoch> = None;
    // (line, hours, height)
    let mut rows: Vec<(usize, f64, f64)> = Vec::new();
    let mut skipped = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line_no = line_num + 1;
        let trimmed = line.trim_end_matches('\0').trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (raw_time, height) = match parse_row(trimmed, config) {
            Ok(parsed) => parsed,
            Err(error) => {
                skipped.push(SkippedRow {
                    line: line_no,
                    error,
                });
                continue;
            }
        };

        let hours = match (raw_time, &config.encoding) {
            (RawTime::Instant(instant, label), _) => {
                let origin = match &epoch {
                    Some(Epoch::Calendar { instant: origin, .. }) => *origin,
                    _ => {
                        epoch = Some(Epoch::Calendar { label, instant });
                        instant
                    }
                };
                instant.signed_duration_since(origin).num_milliseconds() as f64 / 3_600_000.0
            }
            (RawTime::Value(raw), TimeEncoding::ScaleFactor(k)) => {
                if epoch.is_none() {
                    epoch = Some(Epoch::Offset { first_raw: raw });
                }
                raw * k
            }
            (RawTime::Value(raw), TimeEncoding::Pattern(_)) => raw,
        };

        rows.push((line_no, hours, height));
    }

    let Some(epoch) = epoch else {
        return Err(ReadError::NoValidRows {
            skipped: skipped.len(),
        });
    };

    let mut reordered = false;
    if let Some(i) = rows.windows(2).position(|w| w[1].1 < w[0].1) {
        match config.order {
            OrderPolicy::Reject => {
                return Err(ReadError::NonMonotonic {
                    line: rows[i + 1].0,
                });
            }
            OrderPolicy::Sort => {
                warn!(
                    first_line = rows[i + 1].0,
                    "time column is not monotonic; sorting rows by time"
                );
                rows.sort_by(|a, b| a.1.total_cmp(&b.1));
                reordered = true;
            }
        }
    }

    let (time, height): (Vec<f64>, Vec<f64>) = rows.iter().map(|&(_, t, h)| (t, h)).unzip();
    let mut series = TimeSeries::new(time, height, epoch)?;
    if config.height_scale != 1.0 {
        series.scale_heights(config.height_scale)?;
    }

    debug!(
        rows = series.len(),
        skipped = skipped.len(),
        reordered,
        epoch = %series.epoch(),
        "read water-level series"
    );

    Ok(ParsedSeries {
        series,
        skipped,
        reordered,
    })
}

/// Parse a series from raw bytes (invalid UTF-8 is replaced, not fatal).
pub fn read_series_bytes(bytes: &[u8], config: &ReaderConfig) -> Result<ParsedSeries, ReadError> {
    read_series(&String::from_utf8_lossy(bytes), config)
}

/// Read a series file.
///
/// # Example
///
/// ```ignore
/// use tide_harmonics::io::{ReaderConfig, read_series_file};
/// use std::path::Path;
///
/// let parsed = read_series_file(Path::new("95_2024.txt"), &ReaderConfig::default())?;
/// println!("{} samples from {}", parsed.series.len(), parsed.series.epoch());
/// ```
pub fn read_series_file(path: &Path, config: &ReaderConfig) -> Result<ParsedSeries, ReadError> {
    let bytes = fs::read(path)?;
    read_series_bytes(&bytes, config)
}
