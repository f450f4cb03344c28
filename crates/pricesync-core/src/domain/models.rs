use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::symbol::{extract_symbol, Symbol};

/// Resolved quotes for one run. `None` marks a symbol the provider had no usable price for.
pub type QuoteMap = BTreeMap<Symbol, Option<Decimal>>;

/// A row owned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(record_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            record_id: record_id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Canonical symbol held in `field`, if any.
    pub fn symbol(&self, field: &str) -> Option<Symbol> {
        self.field(field).and_then(extract_symbol)
    }
}

/// Proposed write of one resolved price to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIntent {
    pub record_id: String,
    pub price: Decimal,
}

impl UpdateIntent {
    pub fn new(record_id: impl Into<String>, price: Decimal) -> Self {
        Self {
            record_id: record_id.into(),
            price,
        }
    }
}

/// Converts a provider float into a price rounded to `precision` fractional digits.
///
/// NaN, infinities and values outside the decimal range yield `None`.
pub fn normalize_price(raw: f64, precision: u32) -> Option<Decimal> {
    if !raw.is_finite() {
        return None;
    }
    Decimal::from_f64(raw).map(|price| price.round_dp(precision).normalize())
}
