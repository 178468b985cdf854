//! Error types for the pricelist generation pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ParseError`] - Upload bytes are not a well-formed table
//! - [`SchemaError`] - Empty table or missing required columns
//! - [`DataQualityError`] - Blank keys, non-numeric values, non-positive factors
//! - [`ReferentialError`] - RM mapping references an unknown pricelist
//! - [`ValidationError`] - Any of the three validation failures above
//! - [`ArchiveError`] - Failure while packing the output archive
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Every error is terminal
//! for the invocation that raised it.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::{SampleRow, TableKind};

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while turning uploaded bytes into a [`crate::models::Table`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text with broken structure.
    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// Spreadsheet container could not be read.
    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),

    /// Workbook without any worksheet.
    #[error("Spreadsheet has no sheets")]
    NoSheets,

    /// Nothing to use as a header row.
    #[error("No header row found")]
    NoHeaders,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Structural problems with a table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Header present but no data rows.
    #[error(
        "{table} is empty. Please upload a file with {} data.",
        .table.required_columns().join(" and ")
    )]
    EmptyTable { table: TableKind },

    /// Required columns absent.
    #[error(
        "{table} is missing required column(s): {}. Please upload a file containing: {}.",
        .missing.join(", "),
        .table.required_columns().join(", ")
    )]
    MissingColumns { table: TableKind, missing: Vec<String> },
}

/// What was wrong with the offending cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataQualityKind {
    /// Key cell empty after trimming.
    BlankKey,
    /// Cell does not parse as a number.
    NotNumeric,
    /// Factor is zero or negative.
    NonPositiveFactor,
    /// Product exceeds the representable decimal range.
    Overflow,
}

/// Bad cell values, with a bounded sample of the offending rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQualityError {
    pub table: TableKind,
    pub column: String,
    pub kind: DataQualityKind,
    /// Headers of the offending table, aligned with `sample` values.
    pub headers: Vec<String>,
    /// First offending rows, at most [`crate::config::SAMPLE_ROW_LIMIT`].
    pub sample: Vec<SampleRow>,
    /// Total number of offending rows.
    pub total: usize,
}

impl fmt::Display for DataQualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.label();
        let column = &self.column;
        match self.kind {
            DataQualityKind::BlankKey => write!(
                f,
                "{} {} value(s) are blank in the {}. Please fix and upload again.",
                self.total, column, table
            ),
            DataQualityKind::NotNumeric => write!(
                f,
                "{} {} value(s) in the {} are not numeric (example rows attached). \
                 Please correct them.",
                self.total, column, table
            ),
            DataQualityKind::NonPositiveFactor => write!(
                f,
                "{} must be greater than 0 ({} offending row(s) in the {}). \
                 Please fix the pricelist file.",
                column, self.total, table
            ),
            DataQualityKind::Overflow => write!(
                f,
                "{} for {} row(s) of the {} is out of range.",
                column, self.total, table
            ),
        }
    }
}

impl std::error::Error for DataQualityError {}

/// RM mapping points at pricelists the factor table does not define.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "RM Mapping file references pricelist(s) missing from the Pricelist Factors file: {}",
    .missing.join(", ")
)]
pub struct ReferentialError {
    /// Distinct unknown pricelist names, in first-seen order.
    pub missing: Vec<String>,
}

/// Any validation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    DataQuality(#[from] DataQualityError),

    #[error(transparent)]
    Referential(#[from] ReferentialError),
}

impl ValidationError {
    /// Short machine-readable class name.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Schema(_) => "schema",
            ValidationError::DataQuality(_) => "dataQuality",
            ValidationError::Referential(_) => "referential",
        }
    }

    /// Offending rows, when the failure carries any.
    pub fn sample(&self) -> Option<(&[String], &[SampleRow])> {
        match self {
            ValidationError::DataQuality(e) => Some((&e.headers, &e.sample)),
            _ => None,
        }
    }
}

// =============================================================================
// Archive Errors
// =============================================================================

/// Errors while serializing tables and packing the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::generate_pricelists`]
/// and [`crate::transform::pipeline::generate_pricelists_by_rm`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An upload could not be parsed.
    #[error("Could not read the {table}: {source}. Please upload a valid CSV or Excel file.")]
    Parse {
        table: TableKind,
        #[source]
        source: ParseError,
    },

    /// Inputs parsed but failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Output could not be packed.
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl From<SchemaError> for PipelineError {
    fn from(e: SchemaError) -> Self {
        PipelineError::Validation(e.into())
    }
}

impl From<DataQualityError> for PipelineError {
    fn from(e: DataQualityError) -> Self {
        PipelineError::Validation(e.into())
    }
}

impl From<ReferentialError> for PipelineError {
    fn from(e: ReferentialError) -> Self {
        PipelineError::Validation(e.into())
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading uploads.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
