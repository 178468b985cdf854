//! High-level pipeline API: uploads in, zipped pricelists out.
//!
//! This module chains every step with early return on the first failure:
//! loading, validation, pricing and archiving.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricelist::pipeline::{generate_pricelists, UploadedFile};
//!
//! let base = UploadedFile::from_path("base.csv")?;
//! let factors = UploadedFile::from_path("factors.xlsx")?;
//!
//! let archive = generate_pricelists(&base, &factors)?;
//! std::fs::write(&archive.file_name, &archive.bytes)?;
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::archive::{
    flat_entry_name, pricelist_to_csv, rm_entry_path, ArchiveBuilder, PricelistArchive,
};
use crate::config::{FLAT_ARCHIVE_NAME, RM_ARCHIVE_NAME};
use crate::error::{ArchiveError, PipelineError, PipelineResult, ReferentialError};
use crate::models::{SampleRow, Table, TableKind};
use crate::parser::{load_table, InputFormat};
use crate::transform::pricing::price_table;
use crate::validation::{validate_inputs, ValidatedInputs};

/// One uploaded file: raw bytes plus the format they were declared in.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub format: InputFormat,
}

impl UploadedFile {
    /// Declare the format from the file name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let format = InputFormat::from_file_name(&file_name);
        Self { file_name, bytes, format }
    }

    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    /// Read an upload from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self::new(name, bytes))
    }

    /// Parse this upload, tagging failures with the table it was meant to be.
    pub fn load(&self, kind: TableKind) -> PipelineResult<Table> {
        load_table(&self.bytes, self.format)
            .map_err(|source| PipelineError::Parse { table: kind, source })
    }
}

/// What the presentation layer renders after a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GenerationOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        archive: PricelistArchive,
        file_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    ValidationFailure {
        kind: String,
        message: String,
        /// Headers and offending rows, when the failure carries a sample.
        sample: Option<(Vec<String>, Vec<SampleRow>)>,
    },
    ParseFailure {
        message: String,
    },
}

impl GenerationOutcome {
    /// Fold a pipeline result into the three user-facing cases.
    ///
    /// Archive errors are not a user input problem and are passed through.
    pub fn from_result(result: PipelineResult<PricelistArchive>) -> Result<Self, ArchiveError> {
        match result {
            Ok(archive) => Ok(GenerationOutcome::Success {
                file_count: archive.file_count,
                archive,
            }),
            Err(PipelineError::Validation(e)) => Ok(GenerationOutcome::ValidationFailure {
                kind: e.kind().to_string(),
                message: e.to_string(),
                sample: e.sample().map(|(h, s)| (h.to_vec(), s.to_vec())),
            }),
            Err(e @ PipelineError::Parse { .. }) => Ok(GenerationOutcome::ParseFailure {
                message: e.to_string(),
            }),
            Err(PipelineError::Archive(e)) => Err(e),
        }
    }
}

/// Load and validate uploads without generating anything.
pub fn check_uploads(
    base: &UploadedFile,
    factors: &UploadedFile,
    rm_mapping: Option<&UploadedFile>,
) -> PipelineResult<ValidatedInputs> {
    log_info("📖 Reading uploads...");
    let base_table = base.load(TableKind::BasePrice)?;
    let factor_table = factors.load(TableKind::Factors)?;
    let rm_table = rm_mapping
        .map(|rm| rm.load(TableKind::RmMapping))
        .transpose()?;

    log_success(format!("{}: {} rows", TableKind::BasePrice, base_table.len()));
    log_success(format!("{}: {} rows", TableKind::Factors, factor_table.len()));
    if let Some(ref rm) = rm_table {
        log_success(format!("{}: {} rows", TableKind::RmMapping, rm.len()));
    }

    log_info("✔️  Validating...");
    let inputs = validate_inputs(&base_table, &factor_table, rm_table.as_ref())?;
    log_success("Files validated successfully");

    Ok(inputs)
}

/// Flat variant: one `<PricelistName>.csv` per factor row.
pub fn generate_pricelists(
    base: &UploadedFile,
    factors: &UploadedFile,
) -> PipelineResult<PricelistArchive> {
    let inputs = check_uploads(base, factors, None)?;
    build_flat_archive(&inputs)
}

/// RM variant: one `<RMName>/<PricelistName>.csv` per RM mapping row.
pub fn generate_pricelists_by_rm(
    base: &UploadedFile,
    factors: &UploadedFile,
    rm_mapping: &UploadedFile,
) -> PipelineResult<PricelistArchive> {
    let inputs = check_uploads(base, factors, Some(rm_mapping))?;
    build_rm_archive(&inputs)
}

/// Flat variant over already-parsed tables.
pub fn generate_from_tables(base: &Table, factors: &Table) -> PipelineResult<PricelistArchive> {
    let inputs = validate_inputs(base, factors, None)?;
    build_flat_archive(&inputs)
}

/// RM variant over already-parsed tables.
pub fn generate_by_rm_from_tables(
    base: &Table,
    factors: &Table,
    rm_mapping: &Table,
) -> PipelineResult<PricelistArchive> {
    let inputs = validate_inputs(base, factors, Some(rm_mapping))?;
    build_rm_archive(&inputs)
}

/// Price every factor row and pack the results flat.
///
/// Duplicate pricelist names are each computed; the later one replaces the
/// earlier entry.
pub fn build_flat_archive(inputs: &ValidatedInputs) -> PipelineResult<PricelistArchive> {
    log_info(format!("⚙️  Generating {} pricelist(s)...", inputs.factors.len()));
    let mut builder = ArchiveBuilder::new();

    for factor in &inputs.factors {
        let table = price_table(&inputs.base, &factor.pricelist_name, factor.factor)?;
        let csv = pricelist_to_csv(&table.rows)?;
        let name = flat_entry_name(&factor.pricelist_name);
        log_info_indent(
            format!("{} ({} rows, factor {})", name, table.rows.len(), factor.factor),
            1,
        );
        if builder.add(name.clone(), csv) {
            log_warning(format!("Duplicate pricelist name: {} was overwritten", name));
        }
    }

    finish(builder, FLAT_ARCHIVE_NAME)
}

/// Price every RM mapping row and pack the results per RM folder.
///
/// Each mapping row is computed independently, even when several rows name
/// the same pricelist.
pub fn build_rm_archive(inputs: &ValidatedInputs) -> PipelineResult<PricelistArchive> {
    // Later factor rows win for duplicated names.
    let factors: HashMap<&str, Decimal> = inputs
        .factors
        .iter()
        .map(|f| (f.pricelist_name.as_str(), f.factor))
        .collect();

    log_info(format!(
        "⚙️  Generating {} pricelist(s) by RM...",
        inputs.rm_mapping.len()
    ));
    let mut builder = ArchiveBuilder::new();

    for mapping in &inputs.rm_mapping {
        let factor = *factors
            .get(mapping.pricelist_name.as_str())
            .ok_or_else(|| ReferentialError {
                missing: vec![mapping.pricelist_name.clone()],
            })?;

        let table = price_table(&inputs.base, &mapping.pricelist_name, factor)?;
        let csv = pricelist_to_csv(&table.rows)?;
        let path = rm_entry_path(&mapping.rm_name, &mapping.pricelist_name);
        log_info_indent(format!("{} ({} rows, factor {})", path, table.rows.len(), factor), 1);
        if builder.add(path.clone(), csv) {
            log_warning(format!("Duplicate RM mapping: {} was overwritten", path));
        }
    }

    finish(builder, RM_ARCHIVE_NAME)
}

fn finish(builder: ArchiveBuilder, file_name: &str) -> PipelineResult<PricelistArchive> {
    let archive = builder.finish(file_name)?;
    log_success(format!(
        "📌 Generated {} pricelist file(s) into {} ({} bytes)",
        archive.file_count,
        archive.file_name,
        archive.bytes.len()
    ));
    Ok(archive)
}
