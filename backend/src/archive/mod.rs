//! Archive output: generated pricelists as CSV entries in an in-memory zip.
//!
//! Entries are collected in an [`ArchiveBuilder`] first. Adding a path that
//! already exists replaces its content (last write wins) and records the
//! path in [`PricelistArchive::overwritten`]. Nothing touches the disk.
//!
//! # Layout
//!
//! ```text
//! generated_pricelists.zip          generated_pricelists_by_rm.zip
//! ├── Retail.csv                    ├── Alice/
//! └── Wholesale.csv                 │   ├── Retail.csv
//!                                   │   └── Wholesale.csv
//!                                   └── Bob/
//!                                       └── Retail.csv
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ARCHIVE_CONTENT_TYPE;
use crate::error::{ArchiveError, ArchiveResult};
use crate::models::{OutputRow, NEW_PRICE, SKU};
use crate::transform::pricing::PRICE_SCALE;

/// A finished archive, ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricelistArchive {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Suggested download name.
    pub file_name: String,
    pub content_type: String,
    /// Number of entries in the archive.
    pub file_count: usize,
    /// Entry paths written more than once.
    pub overwritten: Vec<String>,
}

/// Ordered, in-memory set of archive entries.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<(String, Vec<u8>)>,
    /// Path -> position in `entries`.
    index: HashMap<String, usize>,
    /// Per entry: already listed in `overwritten`.
    replaced: Vec<bool>,
    overwritten: Vec<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `true` if it replaced an existing one.
    pub fn add(&mut self, path: impl Into<String>, content: Vec<u8>) -> bool {
        let path = path.into();
        if let Some(&idx) = self.index.get(&path) {
            self.entries[idx].1 = content;
            if !self.replaced[idx] {
                self.replaced[idx] = true;
                self.overwritten.push(path);
            }
            return true;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, content));
        self.replaced.push(false);
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Compress every entry into a zip held in memory.
    pub fn finish(self, file_name: &str) -> ArchiveResult<PricelistArchive> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, content) in &self.entries {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(content)?;
        }

        let bytes = zip.finish()?.into_inner();

        Ok(PricelistArchive {
            bytes,
            file_name: file_name.to_string(),
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            file_count: self.entries.len(),
            overwritten: self.overwritten,
        })
    }
}

/// Serialize a generated pricelist as `SKU,NewPrice` CSV.
///
/// Prices always carry exactly two decimals.
pub fn pricelist_to_csv(rows: &[OutputRow]) -> ArchiveResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record([SKU, NEW_PRICE])?;
    for row in rows {
        let price = format!("{:.*}", PRICE_SCALE as usize, row.new_price);
        writer.write_record([row.sku.as_str(), price.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| ArchiveError::Io(std::io::Error::new(e.error().kind(), e.to_string())))
}

/// Make an RM name safe to use as a single folder level.
///
/// Path separators become `_`, and the relative names `.` and `..` become
/// `_` and `__`.
pub fn sanitize_folder_name(name: &str) -> String {
    let name = name.replace(['/', '\\'], "_");
    if name == "." || name == ".." {
        "_".repeat(name.len())
    } else {
        name
    }
}

/// Entry name of a pricelist in a flat archive.
pub fn flat_entry_name(pricelist_name: &str) -> String {
    format!("{}.csv", pricelist_name)
}

/// Entry path of a pricelist inside its RM folder.
pub fn rm_entry_path(rm_name: &str, pricelist_name: &str) -> String {
    format!("{}/{}.csv", sanitize_folder_name(rm_name), pricelist_name)
}
