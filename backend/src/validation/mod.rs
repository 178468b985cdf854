//! Validation of uploaded tables.
//!
//! Checks run class by class over every table of a request, in this order,
//! and stop at the first failure:
//!
//! 1. every table has at least one data row
//! 2. every table has its required columns
//! 3. key columns are not blank after trimming
//! 4. numeric columns parse as decimals
//! 5. factors are strictly positive
//! 6. (RM mapping only) every mapped pricelist exists in the factor table
//!
//! On success the tables come back as typed rows in [`ValidatedInputs`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pricelist::{parse_delimited, validate_inputs};
//!
//! let base = parse_delimited("SKU,BasePrice\nA,10", ',')?;
//! let factors = parse_delimited("PricelistName,Factor\nP1,1.1", ',')?;
//!
//! let inputs = validate_inputs(&base, &factors, None)?;
//! assert_eq!(inputs.base.len(), 1);
//! ```

use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;

use crate::config::SAMPLE_ROW_LIMIT;
use crate::error::{
    DataQualityError, DataQualityKind, ReferentialError, SchemaError, ValidationResult,
};
use crate::models::{
    BasePriceRow, FactorRow, RmMappingRow, SampleRow, Table, TableKind, BASE_PRICE, FACTOR,
    PRICELIST_NAME, RM_NAME, SKU,
};

/// Typed rows of a request that passed every check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedInputs {
    pub base: Vec<BasePriceRow>,
    pub factors: Vec<FactorRow>,
    /// Empty unless an RM mapping table was supplied.
    pub rm_mapping: Vec<RmMappingRow>,
}

/// Validate a request's tables and convert them to typed rows.
///
/// `rm_mapping` is `Some` for the RM-grouped variant.
pub fn validate_inputs(
    base: &Table,
    factors: &Table,
    rm_mapping: Option<&Table>,
) -> ValidationResult<ValidatedInputs> {
    let mut tables = vec![(TableKind::BasePrice, base), (TableKind::Factors, factors)];
    if let Some(rm) = rm_mapping {
        tables.push((TableKind::RmMapping, rm));
    }

    for &(kind, table) in &tables {
        check_not_empty(table, kind)?;
    }
    for &(kind, table) in &tables {
        check_required_columns(table, kind)?;
    }
    for &(kind, table) in &tables {
        for column in kind.key_columns() {
            check_not_blank(table, kind, column)?;
        }
    }

    let base_prices = coerce_numeric(base, TableKind::BasePrice, BASE_PRICE)?;
    let factor_values = coerce_numeric(factors, TableKind::Factors, FACTOR)?;
    check_positive(factors, &factor_values)?;

    let base_rows: Vec<BasePriceRow> = trimmed_column(base, SKU)
        .into_iter()
        .zip(base_prices)
        .enumerate()
        .map(|(i, (sku, base_price))| BasePriceRow {
            sku,
            base_price,
            line: base.line_of(i),
        })
        .collect();

    let factor_rows: Vec<FactorRow> = trimmed_column(factors, PRICELIST_NAME)
        .into_iter()
        .zip(factor_values)
        .map(|(pricelist_name, factor)| FactorRow { pricelist_name, factor })
        .collect();

    let rm_rows: Vec<RmMappingRow> = match rm_mapping {
        Some(rm) => {
            let rows: Vec<RmMappingRow> = trimmed_column(rm, PRICELIST_NAME)
                .into_iter()
                .zip(trimmed_column(rm, RM_NAME))
                .map(|(pricelist_name, rm_name)| RmMappingRow { pricelist_name, rm_name })
                .collect();
            check_referential(&rows, &factor_rows)?;
            rows
        }
        None => Vec::new(),
    };

    Ok(ValidatedInputs {
        base: base_rows,
        factors: factor_rows,
        rm_mapping: rm_rows,
    })
}

/// The table must contain at least one data row.
pub fn check_not_empty(table: &Table, kind: TableKind) -> Result<(), SchemaError> {
    if table.is_empty() {
        return Err(SchemaError::EmptyTable { table: kind });
    }
    Ok(())
}

/// The table must contain every required column of its kind.
pub fn check_required_columns(table: &Table, kind: TableKind) -> Result<(), SchemaError> {
    let missing = table.missing_columns(kind.required_columns());
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns { table: kind, missing });
    }
    Ok(())
}

/// No cell of `column` may be empty after trimming.
pub fn check_not_blank(
    table: &Table,
    kind: TableKind,
    column: &str,
) -> Result<(), DataQualityError> {
    let offending: Vec<usize> = cells(table, column)
        .enumerate()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    ensure_none(table, kind, column, DataQualityKind::BlankKey, &offending)
}

/// Parse every cell of `column` as a decimal.
///
/// Cells that are not numbers fail first; well-formed numbers beyond the
/// decimal range fail as out of range.
pub fn coerce_numeric(
    table: &Table,
    kind: TableKind,
    column: &str,
) -> Result<Vec<Decimal>, DataQualityError> {
    let raw: Vec<&str> = cells(table, column).collect();
    let parsed: Vec<Option<Decimal>> = raw.iter().map(|v| parse_decimal(v)).collect();

    let not_numeric: Vec<usize> = (0..raw.len())
        .filter(|&i| parsed[i].is_none() && !is_numeric_literal(raw[i].trim()))
        .collect();
    ensure_none(table, kind, column, DataQualityKind::NotNumeric, &not_numeric)?;

    let out_of_range: Vec<usize> = (0..raw.len()).filter(|&i| parsed[i].is_none()).collect();
    ensure_none(table, kind, column, DataQualityKind::Overflow, &out_of_range)?;

    Ok(parsed.into_iter().flatten().collect())
}

/// Every factor must be strictly greater than zero.
pub fn check_positive(factors: &Table, values: &[Decimal]) -> Result<(), DataQualityError> {
    let offending: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v <= Decimal::ZERO)
        .map(|(i, _)| i)
        .collect();

    ensure_none(
        factors,
        TableKind::Factors,
        FACTOR,
        DataQualityKind::NonPositiveFactor,
        &offending,
    )
}

/// Every pricelist named by the RM mapping must have a factor.
pub fn check_referential(
    rm_rows: &[RmMappingRow],
    factor_rows: &[FactorRow],
) -> Result<(), ReferentialError> {
    let known: HashSet<&str> = factor_rows.iter().map(|f| f.pricelist_name.as_str()).collect();

    let mut seen = HashSet::new();
    let missing: Vec<String> = rm_rows
        .iter()
        .map(|r| r.pricelist_name.as_str())
        .filter(|name| !known.contains(name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReferentialError { missing })
    }
}

/// Lenient decimal parsing: surrounding whitespace is ignored and
/// scientific notation (`1.5e2`) is accepted. Anything else, including
/// digit separators like `1_000`, is rejected.
///
/// Returns `None` for numbers outside the decimal range as well.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if !is_numeric_literal(s) {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// `[+-]digits[.digits][(e|E)[+-]digits]`, with digits on at least one
/// side of the point.
fn is_numeric_literal(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    let mantissa = mantissa.strip_prefix(['+', '-']).unwrap_or(mantissa);
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !digits(int_part) || !digits(frac_part) || int_part.len() + frac_part.len() == 0 {
        return false;
    }

    match exponent {
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && digits(exp)
        }
        None => true,
    }
}

/// Cells of a column that is known to exist.
fn cells<'a>(table: &'a Table, column: &str) -> impl Iterator<Item = &'a str> + 'a {
    table.column(column).into_iter().flatten()
}

fn trimmed_column(table: &Table, column: &str) -> Vec<String> {
    cells(table, column).map(|v| v.trim().to_string()).collect()
}

/// Fail with a sampled [`DataQualityError`] if any row index is offending.
fn ensure_none(
    table: &Table,
    kind: TableKind,
    column: &str,
    dq_kind: DataQualityKind,
    offending: &[usize],
) -> Result<(), DataQualityError> {
    if offending.is_empty() {
        return Ok(());
    }

    let sample = offending
        .iter()
        .take(SAMPLE_ROW_LIMIT)
        .map(|&i| SampleRow {
            line: table.line_of(i),
            values: table.rows[i].clone(),
        })
        .collect();

    Err(DataQualityError {
        table: kind,
        column: column.to_string(),
        kind: dq_kind,
        headers: table.headers.clone(),
        sample,
        total: offending.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::parser::parse_delimited;

    fn t(csv: &str) -> Table {
        parse_delimited(csv, ',').unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_valid_inputs_are_typed_and_trimmed() {
        let base = t("SKU,BasePrice\n  A ,10\nB, 12.50 ");
        let factors = t("PricelistName,Factor\n P1 ,1.1");

        let inputs = validate_inputs(&base, &factors, None).unwrap();

        assert_eq!(inputs.base[0].sku, "A");
        assert_eq!(inputs.base[0].base_price, d("10"));
        assert_eq!(inputs.base[1].base_price, d("12.50"));
        assert_eq!(inputs.factors[0].pricelist_name, "P1");
        assert_eq!(inputs.factors[0].factor, d("1.1"));
        assert!(inputs.rm_mapping.is_empty());
    }

    #[test]
    fn test_empty_table_checked_first() {
        let base = t("SKU,BasePrice\n");
        // Factors are also missing a column, but emptiness is checked first.
        let factors = t("PricelistName\nP1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Schema(SchemaError::EmptyTable { table: TableKind::BasePrice })
        );
    }

    #[test]
    fn test_missing_columns_named() {
        let base = t("SKU,Price\nA,10");
        let factors = t("PricelistName,Factor\nP1,1.1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        match err {
            ValidationError::Schema(SchemaError::MissingColumns { table, missing }) => {
                assert_eq!(table, TableKind::BasePrice);
                assert_eq!(missing, vec!["BasePrice"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_blank_sku_reported_with_sample() {
        let base = t("SKU,BasePrice\nA,10\n  ,11\nC,12");
        let factors = t("PricelistName,Factor\nP1,1.1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.kind, DataQualityKind::BlankKey);
        assert_eq!(dq.column, "SKU");
        assert_eq!(dq.total, 1);
        assert_eq!(dq.sample[0].line, 3);
        assert_eq!(dq.sample[0].values, vec!["  ", "11"]);
    }

    #[test]
    fn test_blank_pricelist_name() {
        let base = t("SKU,BasePrice\nA,10");
        let factors = t("PricelistName,Factor\n,1.1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.table, TableKind::Factors);
        assert_eq!(dq.column, "PricelistName");
    }

    #[test]
    fn test_non_numeric_sample_is_bounded() {
        let mut csv = String::from("SKU,BasePrice\n");
        for i in 0..8 {
            csv.push_str(&format!("S{},n/a\n", i));
        }
        let base = t(&csv);
        let factors = t("PricelistName,Factor\nP1,1.1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.kind, DataQualityKind::NotNumeric);
        assert_eq!(dq.column, "BasePrice");
        assert_eq!(dq.total, 8);
        assert_eq!(dq.sample.len(), SAMPLE_ROW_LIMIT);
        assert!(dq.to_string().contains("BasePrice"));
    }

    #[test]
    fn test_non_positive_factor() {
        let base = t("SKU,BasePrice\nA,10");

        for bad in ["0", "-1.5"] {
            let factors = t(&format!("PricelistName,Factor\nP1,1.1\nP2,{}", bad));
            let err = validate_inputs(&base, &factors, None).unwrap_err();
            let ValidationError::DataQuality(dq) = err else {
                panic!("expected data quality error");
            };
            assert_eq!(dq.kind, DataQualityKind::NonPositiveFactor);
            assert_eq!(dq.sample[0].line, 3);
        }
    }

    #[test]
    fn test_negative_base_price_allowed() {
        let base = t("SKU,BasePrice\nA,-5");
        let factors = t("PricelistName,Factor\nP1,2");
        let inputs = validate_inputs(&base, &factors, None).unwrap();
        assert_eq!(inputs.base[0].base_price, d("-5"));
    }

    #[test]
    fn test_referential_error_names_unknown_pricelists() {
        let base = t("SKU,BasePrice\nA,10");
        let factors = t("PricelistName,Factor\nP1,1.1");
        let rm = t("PricelistName,RMName\nP1,Alice\nP9,Bob\nP9,Carol\nP7,Dan");

        let err = validate_inputs(&base, &factors, Some(&rm)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Referential(ReferentialError {
                missing: vec!["P9".into(), "P7".into()]
            })
        );
    }

    #[test]
    fn test_rm_mapping_typed() {
        let base = t("SKU,BasePrice\nA,10");
        let factors = t("PricelistName,Factor\nP1,1.1\nP2,0.9");
        let rm = t("PricelistName,RMName\nP1, Alice \nP2,Bob");

        let inputs = validate_inputs(&base, &factors, Some(&rm)).unwrap();
        assert_eq!(inputs.rm_mapping.len(), 2);
        assert_eq!(inputs.rm_mapping[0].rm_name, "Alice");
    }

    #[test]
    fn test_blank_rm_name() {
        let base = t("SKU,BasePrice\nA,10");
        let factors = t("PricelistName,Factor\nP1,1.1");
        let rm = t("PricelistName,RMName\nP1,");

        let err = validate_inputs(&base, &factors, Some(&rm)).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.table, TableKind::RmMapping);
        assert_eq!(dq.column, "RMName");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(" 10 "), Some(d("10")));
        assert_eq!(parse_decimal("1.5e2"), Some(d("150")));
        assert_eq!(parse_decimal("-0.25"), Some(d("-0.25")));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1,5"), None);
        assert_eq!(parse_decimal(".5"), Some(d("0.5")));
        assert_eq!(parse_decimal("+2E-1"), Some(d("0.2")));
    }

    #[test]
    fn test_parse_decimal_rejects_digit_separators() {
        for raw in ["1_000", "1__0", "_5", "1.5_", "1e_2", "1e", "e5", ".", "-", "1.2.3"] {
            assert_eq!(parse_decimal(raw), None, "{raw:?} should not parse");
        }

        let base = t("SKU,BasePrice\nA,10\nB,1_000");
        let factors = t("PricelistName,Factor\nP1,1.1");
        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.kind, DataQualityKind::NotNumeric);
        assert_eq!(dq.sample[0].values, vec!["B", "1_000"]);
    }

    #[test]
    fn test_out_of_range_number_is_overflow() {
        assert_eq!(parse_decimal("1e30"), None);

        let base = t("SKU,BasePrice\nA,10\nB,1e30");
        let factors = t("PricelistName,Factor\nP1,1.1");
        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.kind, DataQualityKind::Overflow);
        assert_eq!(dq.sample[0].line, 3);
        assert!(dq.to_string().contains("out of range"));

        // A real typo in the same column is reported before the range problem.
        let base = t("SKU,BasePrice\nA,x\nB,1e30");
        let ValidationError::DataQuality(dq) = validate_inputs(&base, &factors, None).unwrap_err()
        else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.kind, DataQualityKind::NotNumeric);
    }

    #[test]
    fn test_sample_line_skips_blank_lines() {
        let base = t("SKU,BasePrice\nA,10\n\n\nB,abc\n");
        let factors = t("PricelistName,Factor\nP1,1.1");

        let err = validate_inputs(&base, &factors, None).unwrap_err();
        let ValidationError::DataQuality(dq) = err else {
            panic!("expected data quality error");
        };
        assert_eq!(dq.sample[0].line, 5);

        let inputs = validate_inputs(&t("SKU,BasePrice\n\nA,10\n"), &factors, None).unwrap();
        assert_eq!(inputs.base[0].line, 3);
    }
}
