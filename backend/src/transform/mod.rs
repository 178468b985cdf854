//! Transformation module.
//!
//! This module turns validated inputs into generated pricelists:
//! - Pricing: `round(BasePrice * Factor, 2)` per SKU
//! - Pipeline: load, validate, price and archive in one call

pub mod pipeline;
pub mod pricing;

pub use pipeline::*;
pub use pricing::{price_table, round_price, PRICE_SCALE};
