//! Component report: a fitted model as plain text.
//!
//! # File Format
//!
//! ```text
//! # epoch: 01/01/2024 00:00:00
//! # mean: 1.250000000
//! # columns: name pulsation(rad/h) amplitude(m) phase(rad)
//! M2 0.505868100 1.192050000 0.301000000
//! S2 0.523598776 0.402000000 -1.200000000
//! ```
//!
//! Phases are written as fitted, not wrapped. A report read back with
//! [`parse_component_report`] synthesizes the same curve as the model that
//! produced it, up to the printed precision.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::analysis::{Epoch, HarmonicModel, ModelError};

/// Error type for component reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Parse error with line number
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// One name is needed per model component
    #[error("Name count mismatch: {names} names for {components} components")]
    NameMismatch { names: usize, components: usize },

    /// Name that cannot be written as a single token
    #[error("Invalid constituent name: {0:?}")]
    InvalidName(String),

    /// Report components do not form a valid model
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Parsed component report.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentReport {
    /// Epoch label from the header (empty if absent)
    pub epoch: String,
    /// Constituent names, in model order
    pub names: Vec<String>,
    /// Model rebuilt from the rows
    pub model: HarmonicModel,
}

/// Render a fitted model as a component report.
pub fn write_component_report(
    epoch: &Epoch,
    names: &[&str],
    model: &HarmonicModel,
) -> Result<String, ReportError> {
    if names.len() != model.len() {
        return Err(ReportError::NameMismatch {
            names: names.len(),
            components: model.len(),
        });
    }
    if let Some(bad) = names
        .iter()
        .find(|n| n.is_empty() || n.contains(char::is_whitespace))
    {
        return Err(ReportError::InvalidName(bad.to_string()));
    }

    let mut out = String::new();
    out.push_str(&format!("# epoch: {}\n", epoch.label()));
    out.push_str(&format!("# mean: {:.9}\n", model.mean()));
    out.push_str("# columns: name pulsation(rad/h) amplitude(m) phase(rad)\n");
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!(
            "{} {:.9} {:.9} {:.9}\n",
            name,
            model.pulsations()[i],
            model.amplitudes()[i],
            model.phases()[i]
        ));
    }
    Ok(out)
}

/// Write a component report to a file.
pub fn write_component_report_file(
    path: &Path,
    epoch: &Epoch,
    names: &[&str],
    model: &HarmonicModel,
) -> Result<(), ReportError> {
    let text = write_component_report(epoch, names, model)?;
    fs::write(path, text)?;
    Ok(())
}

fn parse_field(value: &str, line: usize, what: &str) -> Result<f64, ReportError> {
    value.parse().map_err(|_| ReportError::ParseError {
        line,
        message: format!("Invalid {what}: {value:?}"),
    })
}

/// Parse a component report.
pub fn parse_component_report(content: &str) -> Result<ComponentReport, ReportError> {
    let mut epoch = String::new();
    let mut mean = 0.0;
    let mut names = Vec::new();
    let mut pulsations = Vec::new();
    let mut amplitudes = Vec::new();
    let mut phases = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line_no = line_num + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            let comment = comment.trim();
            if let Some(label) = comment.strip_prefix("epoch:") {
                epoch = label.trim().to_string();
            } else if let Some(value) = comment.strip_prefix("mean:") {
                mean = parse_field(value.trim(), line_no, "mean")?;
            }
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(ReportError::ParseError {
                line: line_no,
                message: "Expected: name pulsation amplitude phase".into(),
            });
        }

        names.push(parts[0].to_string());
        pulsations.push(parse_field(parts[1], line_no, "pulsation")?);
        amplitudes.push(parse_field(parts[2], line_no, "amplitude")?);
        phases.push(parse_field(parts[3], line_no, "phase")?);
    }

    let model = HarmonicModel::new(pulsations, amplitudes, phases, mean)?;
    Ok(ComponentReport {
        epoch,
        names,
        model,
    })
}

/// Read a component report file.
pub fn read_component_report_file(path: &Path) -> Result<ComponentReport, ReportError> {
    let content = fs::read_to_string(path)?;
    parse_component_report(&content)
}
