//! Domain models for the pricelist generation pipeline.
//!
//! This module contains the data structures passed between pipeline stages:
//!
//! - [`Table`] - Untyped parse output (headers + string cells)
//! - [`TableKind`] - Which upload a table came from, with its required columns
//! - [`BasePriceRow`], [`FactorRow`], [`RmMappingRow`] - Validated input rows
//! - [`OutputRow`], [`PricelistTable`] - Transformer output
//! - [`SampleRow`] - An offending row attached to a data quality error

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Column names
// =============================================================================

pub const SKU: &str = "SKU";
pub const BASE_PRICE: &str = "BasePrice";
pub const PRICELIST_NAME: &str = "PricelistName";
pub const FACTOR: &str = "Factor";
pub const RM_NAME: &str = "RMName";
pub const NEW_PRICE: &str = "NewPrice";

// =============================================================================
// Table kinds
// =============================================================================

/// The role an uploaded table plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableKind {
    /// SKU + BasePrice.
    BasePrice,
    /// PricelistName + Factor.
    Factors,
    /// PricelistName + RMName.
    RmMapping,
}

impl TableKind {
    /// Human-readable label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            TableKind::BasePrice => "Base Price file",
            TableKind::Factors => "Pricelist Factors file",
            TableKind::RmMapping => "RM Mapping file",
        }
    }

    /// Columns the table must contain.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::BasePrice => &[SKU, BASE_PRICE],
            TableKind::Factors => &[PRICELIST_NAME, FACTOR],
            TableKind::RmMapping => &[PRICELIST_NAME, RM_NAME],
        }
    }

    /// Columns that must not be blank after trimming.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::BasePrice => &[SKU],
            TableKind::Factors => &[PRICELIST_NAME],
            TableKind::RmMapping => &[PRICELIST_NAME, RM_NAME],
        }
    }

    /// Columns that must coerce to a number.
    pub fn numeric_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::BasePrice => &[BASE_PRICE],
            TableKind::Factors => &[FACTOR],
            TableKind::RmMapping => &[],
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Untyped table
// =============================================================================

/// A parsed upload: named columns and ordered rows of raw cell text.
///
/// Every row has exactly `headers.len()` cells. `lines` holds the 1-based
/// line (or sheet row) each data row came from, since blank rows are
/// skipped while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub lines: Vec<usize>,
}

impl Table {
    /// Table whose rows sit on consecutive lines right after the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let lines = (2..rows.len() + 2).collect();
        Self { headers, rows, lines }
    }

    /// Table with explicit source lines, one per row.
    pub fn with_lines(headers: Vec<String>, rows: Vec<Vec<String>>, lines: Vec<usize>) -> Self {
        debug_assert_eq!(rows.len(), lines.len());
        Self { headers, rows, lines }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with this exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell values of a column, in row order.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.get(idx).map(String::as_str).unwrap_or("")),
        )
    }

    /// Required columns absent from the headers, in required order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    /// Rows as JSON objects keyed by header (used by the `parse` command).
    pub fn to_json_records(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }

    /// 1-based line in the uploaded file of the data row at `row_idx`.
    pub fn line_of(&self, row_idx: usize) -> usize {
        self.lines.get(row_idx).copied().unwrap_or(row_idx + 2)
    }
}

// =============================================================================
// Validated rows
// =============================================================================

/// One validated base price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePriceRow {
    pub sku: String,
    pub base_price: Decimal,
    /// Source line in the base price upload.
    pub line: usize,
}

/// One validated pricelist factor (always > 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorRow {
    pub pricelist_name: String,
    pub factor: Decimal,
}

/// Assignment of a pricelist to a relationship manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmMappingRow {
    pub pricelist_name: String,
    pub rm_name: String,
}

/// One priced SKU in a generated pricelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub sku: String,
    pub new_price: Decimal,
}

/// A generated pricelist before serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricelistTable {
    pub pricelist_name: String,
    pub rows: Vec<OutputRow>,
}

// =============================================================================
// Error samples
// =============================================================================

/// An offending input row, as it appeared in the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRow {
    /// 1-based line in the uploaded file (header is line 1).
    pub line: usize,
    /// Raw cells, aligned with the table headers.
    pub values: Vec<String>,
}
