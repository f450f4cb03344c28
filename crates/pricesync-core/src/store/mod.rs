//! Record store contract.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`RecordStore`] | List records, bulk update, single update |
//! | [`RecordUpdate`] | `{record_id, fields}` pair sent to the store |
//! | [`PriceEncoding`] | Wire representation of the price field |
//! | [`StoreError`] | Classified store failure |
//! | [`BitableStore`] | Feishu Bitable implementation |

mod auth;
mod bitable;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::domain::{Record, UpdateIntent};

pub use auth::AppTokenProvider;
pub use bitable::BitableStore;

/// Store error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Credential exchange failed or the token was rejected.
    Auth,
    /// Listing records failed.
    Read,
    /// An update call failed.
    Write,
    /// The store answered with a payload that could not be decoded.
    Decode,
    /// The request never produced a response.
    Transport,
}

/// Structured record-store error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
    status: Option<u16>,
    api_code: Option<i64>,
}

impl StoreError {
    fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            api_code: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Auth, message)
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Read, message)
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Write, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Decode, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transport, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_api_code(mut self, code: i64) -> Self {
        self.api_code = Some(code);
        self
    }

    pub const fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn api_code(&self) -> Option<i64> {
        self.api_code
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Auth)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        if let Some(code) = self.api_code {
            write!(f, " (code {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

/// Wire representation of the price value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceEncoding {
    /// JSON number.
    #[default]
    Number,
    /// Decimal string with exactly `precision` fractional digits.
    Text,
}

impl PriceEncoding {
    pub fn encode(self, price: Decimal, precision: u32) -> Value {
        let rounded = price.round_dp(precision);
        match self {
            Self::Number => rounded
                .to_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(rounded.to_string())),
            Self::Text => Value::String(format!("{:.*}", precision as usize, rounded)),
        }
    }
}

/// One `{record_id, fields}` pair as the store expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordUpdate {
    pub record_id: String,
    pub fields: Map<String, Value>,
}

impl RecordUpdate {
    pub fn from_intent(
        intent: &UpdateIntent,
        price_field: &str,
        encoding: PriceEncoding,
        precision: u32,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert(
            price_field.to_owned(),
            encoding.encode(intent.price, precision),
        );
        Self {
            record_id: intent.record_id.clone(),
            fields,
        }
    }
}

/// Record store contract.
pub trait RecordStore: Send + Sync {
    /// Lists every record of the configured table.
    fn list_records<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + 'a>>;

    /// Applies all `updates` in one call. Any failure fails the whole call.
    fn batch_update<'a>(
        &'a self,
        updates: &'a [RecordUpdate],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Applies one update.
    fn update_record<'a>(
        &'a self,
        update: &'a RecordUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn number_encoding_is_a_json_number() {
        assert_eq!(
            PriceEncoding::Number.encode(dec!(150.12345), 5),
            json!(150.12345)
        );
    }

    #[test]
    fn text_encoding_pads_to_precision() {
        assert_eq!(
            PriceEncoding::Text.encode(dec!(410.5), 5),
            json!("410.50000")
        );
    }

    #[test]
    fn update_carries_only_the_price_field() {
        let update = RecordUpdate::from_intent(
            &UpdateIntent::new("rec1", dec!(3.2)),
            "fldPrice",
            PriceEncoding::Number,
            5,
        );

        assert_eq!(
            serde_json::to_value(&update).expect("serializes"),
            json!({ "record_id": "rec1", "fields": { "fldPrice": 3.2 } })
        );
    }

    #[test]
    fn display_includes_status_and_code() {
        let error = StoreError::write("batch_update rejected")
            .with_status(400)
            .with_api_code(1254045);
        assert_eq!(
            error.to_string(),
            "batch_update rejected (status 400) (code 1254045)"
        );
    }
}
