//! # Pricelist - derived price lists from base prices and factors
//!
//! Pricelist takes a base price table (`SKU`, `BasePrice`) and a table of
//! pricelist factors (`PricelistName`, `Factor`), and generates one CSV per
//! pricelist with `NewPrice = round(BasePrice * Factor, 2)`, packed into a
//! zip archive. An optional RM mapping (`PricelistName`, `RMName`) nests the
//! generated files into one folder per relationship manager.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Loader    │────▶│  Validator  │────▶│   Pricing   │
//! │  uploads    │     │ (auto-enc)  │     │ (1st error) │     │ (per list)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                                                             ┌──────▼──────┐
//!                                                             │   Archive   │
//!                                                             │ (zip, mem)  │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pricelist::{generate_pricelists, UploadedFile};
//!
//! let base = UploadedFile::from_path("base.csv")?;
//! let factors = UploadedFile::from_path("factors.csv")?;
//! let archive = generate_pricelists(&base, &factors)?;
//! println!("Generated {} files", archive.file_count);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Tables and typed rows
//! - [`parser`] - CSV and spreadsheet loading
//! - [`validation`] - Column, key, numeric and referential checks
//! - [`transform`] - Pricing and the end-to-end pipeline
//! - [`archive`] - CSV serialization and zip packing
//! - [`config`] - Constants and server settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Output
pub mod archive;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ArchiveError, DataQualityError, DataQualityKind, ParseError, PipelineError,
    ReferentialError, SchemaError, ServerError, ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BasePriceRow, FactorRow, OutputRow, PricelistTable, RmMappingRow, SampleRow, Table,
    TableKind,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, load_table, load_table_file,
    parse_delimited, parse_delimited_auto, parse_spreadsheet, InputFormat,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{parse_decimal, validate_inputs, ValidatedInputs};

// =============================================================================
// Re-exports - Pricing
// =============================================================================

pub use transform::pricing::{price_table, round_price};

// =============================================================================
// Re-exports - Archive
// =============================================================================

pub use archive::{pricelist_to_csv, sanitize_folder_name, ArchiveBuilder, PricelistArchive};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    check_uploads, generate_by_rm_from_tables, generate_from_tables, generate_pricelists,
    generate_pricelists_by_rm, GenerationOutcome, UploadedFile,
};

/// Pipeline entry points under a short path.
pub mod pipeline {
    pub use crate::transform::pipeline::*;
}

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
