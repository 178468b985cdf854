//! Price computation: `NewPrice = round(BasePrice * Factor, 2)`.
//!
//! Rounding is banker's rounding (half to even) on exact decimals, so
//! `2.675 * 1` gives `2.68` and `0.125 * 1` gives `0.12`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::SAMPLE_ROW_LIMIT;
use crate::error::{DataQualityError, DataQualityKind};
use crate::models::{
    BasePriceRow, OutputRow, PricelistTable, SampleRow, TableKind, BASE_PRICE, SKU,
};

/// Fractional digits kept in every generated price.
pub const PRICE_SCALE: u32 = 2;

/// Round a price to [`PRICE_SCALE`] digits, half to even.
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Apply one factor to every base price, preserving row order.
///
/// The output always has exactly one row per base row.
pub fn price_table(
    base: &[BasePriceRow],
    pricelist_name: &str,
    factor: Decimal,
) -> Result<PricelistTable, DataQualityError> {
    let mut rows = Vec::with_capacity(base.len());
    let mut overflowed = Vec::new();

    for (i, row) in base.iter().enumerate() {
        match row.base_price.checked_mul(factor) {
            Some(product) => rows.push(OutputRow {
                sku: row.sku.clone(),
                new_price: round_price(product),
            }),
            None => overflowed.push(i),
        }
    }

    if !overflowed.is_empty() {
        return Err(DataQualityError {
            table: TableKind::BasePrice,
            column: BASE_PRICE.to_string(),
            kind: DataQualityKind::Overflow,
            headers: vec![SKU.to_string(), BASE_PRICE.to_string()],
            sample: overflowed
                .iter()
                .take(SAMPLE_ROW_LIMIT)
                .map(|&i| SampleRow {
                    line: base[i].line,
                    values: vec![base[i].sku.clone(), base[i].base_price.to_string()],
                })
                .collect(),
            total: overflowed.len(),
        });
    }

    Ok(PricelistTable {
        pricelist_name: pricelist_name.to_string(),
        rows,
    })
}
