//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Trimmed, case-preserving instrument key |
//! | [`Record`] | Store row: `record_id` plus raw fields |
//! | [`UpdateIntent`] | One price to write to one record |
//! | [`QuoteMap`] | Symbol to optional rounded price |
//!
//! Symbol extraction ([`extract_symbol`]) is total: any field shape it does
//! not recognise yields `None`, so a malformed record never aborts a run.

mod models;
mod symbol;

pub use models::{normalize_price, QuoteMap, Record, UpdateIntent};
pub use symbol::{extract_symbol, Symbol};
