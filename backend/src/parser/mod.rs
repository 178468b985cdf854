//! Upload loader: delimited text or spreadsheet bytes into a [`Table`].
//!
//! Delimited text gets encoding and delimiter auto-detection. Spreadsheets
//! (xlsx, xls, ods) are read from their first sheet. No schema is assumed
//! here; column checks happen in [`crate::validation`].

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::Table;

/// Declared format of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// CSV / TSV / any single-character delimiter.
    Delimited,
    /// Excel or OpenDocument workbook.
    Spreadsheet,
}

impl InputFormat {
    /// Pick a format from an upload's file name.
    ///
    /// Text extensions are delimited, everything else is treated as a
    /// spreadsheet.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if [".csv", ".tsv", ".txt"].iter().any(|ext| lower.ends_with(ext)) {
            InputFormat::Delimited
        } else {
            InputFormat::Spreadsheet
        }
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// A leading UTF-8 byte order mark is dropped so it never ends up in the
/// first header name.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(label) => label.decode(bytes).0.to_string(),
            // Fallback: UTF-8 with lossy conversion
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };

    decoded.trim_start_matches('\u{feff}').to_string()
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Comma wins ties and is used when no candidate appears at all.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Load an upload in its declared format.
pub fn load_table(bytes: &[u8], format: InputFormat) -> ParseResult<Table> {
    match format {
        InputFormat::Delimited => parse_delimited_auto(bytes),
        InputFormat::Spreadsheet => parse_spreadsheet(bytes),
    }
}

/// Load a file from disk, picking the format from its extension.
pub fn load_table_file<P: AsRef<Path>>(path: P) -> ParseResult<Table> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    load_table(&bytes, InputFormat::from_file_name(name))
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_delimited_auto(bytes: &[u8]) -> ParseResult<Table> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_delimited(&content, delimiter)
}

/// Parse delimited text with an explicit delimiter.
///
/// Short rows are padded with empty cells, extra cells are dropped and
/// blank lines are skipped.
pub fn parse_delimited(content: &str, delimiter: char) -> ParseResult<Table> {
    let delimiter = u8::try_from(delimiter).map_err(|_| ParseError::Malformed {
        line: 1,
        message: format!("Unsupported delimiter '{}'", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header_record = match records.next() {
        Some(result) => result.map_err(csv_error)?,
        None => return Err(ParseError::NoHeaders),
    };

    let headers: Vec<String> = header_record
        .iter()
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for result in records {
        let record = result.map_err(csv_error)?;

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);
        let row = (0..headers.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        rows.push(row);
        lines.push(line);
    }

    Ok(Table::with_lines(headers, rows, lines))
}

fn csv_error(e: csv::Error) -> ParseError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    ParseError::Malformed {
        line,
        message: e.to_string(),
    }
}

/// Parse a workbook (xlsx, xls, ods) from bytes, using its first sheet.
///
/// The first row is the header. Rows whose cells are all empty are skipped.
pub fn parse_spreadsheet(bytes: &[u8]) -> ParseResult<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoSheets)?
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    // Sheet row (0-based) of the header; the range may not start at A1.
    let header_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows_iter = range.rows();

    let headers: Vec<String> = rows_iter
        .next()
        .ok_or(ParseError::NoHeaders)?
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for (offset, row) in rows_iter.enumerate() {
        if row.iter().all(|c| cell_to_string(c).trim().is_empty()) {
            continue;
        }
        rows.push(
            (0..headers.len())
                .map(|i| row.get(i).map(cell_to_string).unwrap_or_default())
                .collect(),
        );
        lines.push(header_row + offset + 2);
    }

    Ok(Table::with_lines(headers, rows, lines))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_delimited("SKU,BasePrice\nA,10\nB,25", ',').unwrap();

        assert_eq!(table.headers, vec!["SKU", "BasePrice"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["A", "10"]);
        assert_eq!(table.rows[1], vec!["B", "25"]);
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "PricelistName,Factor\n\"Retail, EU\",1.2";
        let table = parse_delimited(csv, ',').unwrap();

        assert_eq!(table.rows[0][0], "Retail, EU");
        assert_eq!(table.rows[0][1], "1.2");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_delimited("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lines_survive_skipped_blank_rows() {
        let table = parse_delimited("SKU,BasePrice\nA,10\n\n\nB,abc\n,\nC,3\n", ',').unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.lines, vec![2, 5, 7]);
        assert_eq!(table.line_of(1), 5);
    }

    #[test]
    fn test_ragged_rows() {
        let table = parse_delimited("a;b;c\n1;;3\n4\n5;6;7;8", ';').unwrap();

        assert_eq!(table.rows[0], vec!["1", "", "3"]);
        assert_eq!(table.rows[1], vec!["4", "", ""]);
        assert_eq!(table.rows[2], vec!["5", "6", "7"]);
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = parse_delimited_auto(b"SKU,BasePrice\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 2);
    }

    #[test]
    fn test_empty_input_error() {
        let err = parse_delimited_auto(b"").unwrap_err();
        assert!(matches!(err, ParseError::NoHeaders));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("SKU\nA"), ',');
    }

    #[test]
    fn test_auto_parse_semicolon() {
        let table = parse_delimited_auto(b"SKU;BasePrice\nA;10").unwrap();
        assert_eq!(table.headers, vec!["SKU", "BasePrice"]);
        assert_eq!(table.rows[0][1], "10");
    }

    #[test]
    fn test_bom_stripped_from_header() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"SKU,BasePrice\nA,10");
        let table = parse_delimited_auto(&bytes).unwrap();
        assert_eq!(table.headers[0], "SKU");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(InputFormat::from_file_name("base.csv"), InputFormat::Delimited);
        assert_eq!(InputFormat::from_file_name("BASE.CSV"), InputFormat::Delimited);
        assert_eq!(InputFormat::from_file_name("factors.xlsx"), InputFormat::Spreadsheet);
        assert_eq!(InputFormat::from_file_name("factors"), InputFormat::Spreadsheet);
    }

    #[test]
    fn test_garbage_spreadsheet_is_parse_error() {
        let err = load_table(b"definitely not a workbook", InputFormat::Spreadsheet).unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet(_)));
    }

    #[test]
    fn test_xlsx_first_sheet() {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "SKU").unwrap();
        sheet.write_string(0, 1, "BasePrice").unwrap();
        sheet.write_string(1, 0, "A").unwrap();
        sheet.write_number(1, 1, 10.0).unwrap();
        sheet.write_string(3, 0, "B").unwrap();
        sheet.write_number(3, 1, 12.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = load_table(&bytes, InputFormat::Spreadsheet).unwrap();
        assert_eq!(table.headers, vec!["SKU", "BasePrice"]);
        // Row 3 (index 2) is empty and skipped.
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["A", "10"]);
        assert_eq!(table.rows[1], vec!["B", "12.5"]);
        assert_eq!(table.lines, vec![2, 4]);
    }

    #[test]
    fn test_load_table_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factors.csv");
        std::fs::write(&path, "PricelistName,Factor\nP1,1.1\n").unwrap();

        let table = load_table_file(&path).unwrap();
        assert_eq!(table.rows, vec![vec!["P1".to_string(), "1.1".to_string()]]);
    }
}
