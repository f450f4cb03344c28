//! Joins records to quotes and produces the update intents.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::domain::{QuoteMap, Record, Symbol, UpdateIntent};
use crate::write_back::WriteTally;

/// Outcome of one run: intents in record order plus the run counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub intents: Vec<UpdateIntent>,
    pub records_seen: usize,
    /// Distinct non-empty symbols across all records.
    pub symbols_extracted: usize,
    /// Distinct extracted symbols that have a usable price.
    pub quotes_resolved: usize,
    pub updates: WriteTally,
}

impl ReconciliationResult {
    pub fn with_updates(mut self, updates: WriteTally) -> Self {
        self.updates = updates;
        self
    }
}

/// Distinct symbols held in `symbol_field` across `records`.
pub fn collect_symbols(records: &[Record], symbol_field: &str) -> BTreeSet<Symbol> {
    records
        .iter()
        .filter_map(|record| record.symbol(symbol_field))
        .collect()
}

/// Emits one intent per record whose symbol has a usable quote, in record order.
///
/// Records sharing a symbol each get their own intent. A symbol missing from
/// `quotes` is treated exactly like a `None` quote.
pub fn reconcile(records: &[Record], quotes: &QuoteMap, symbol_field: &str) -> ReconciliationResult {
    let mut symbols = BTreeSet::new();
    let mut intents = Vec::new();

    for record in records {
        let Some(symbol) = record.symbol(symbol_field) else {
            continue;
        };

        if let Some(Some(price)) = quotes.get(&symbol) {
            intents.push(UpdateIntent::new(record.record_id.clone(), *price));
        }
        symbols.insert(symbol);
    }

    let quotes_resolved = symbols
        .iter()
        .filter(|symbol| matches!(quotes.get(*symbol), Some(Some(_))))
        .count();

    ReconciliationResult {
        intents,
        records_seen: records.len(),
        symbols_extracted: symbols.len(),
        quotes_resolved,
        updates: WriteTally::default(),
    }
}
