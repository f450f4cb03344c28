//! Batched quote retrieval with bounded retry and per-symbol isolation.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::data_source::{QuoteBatch, QuoteRequest, QuoteRow, QuoteSource};
use crate::domain::{normalize_price, QuoteMap, Symbol};
use crate::retry::RetryPolicy;

/// Why a symbol in an obtained batch resolved to no price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    NotInResponse,
    Undecodable(String),
    NoUsablePrice,
}

/// Fetches last-session prices for a set of symbols.
#[derive(Clone)]
pub struct QuoteFetcher {
    source: Arc<dyn QuoteSource>,
    retry: RetryPolicy,
    precision: u32,
}

impl QuoteFetcher {
    pub fn new(source: Arc<dyn QuoteSource>, retry: RetryPolicy, precision: u32) -> Self {
        Self {
            source,
            retry,
            precision,
        }
    }

    /// Returns one entry per requested symbol once a batch is obtained; an
    /// empty map when no batch could be obtained or nothing was requested.
    ///
    /// Never fails: provider exhaustion is logged as a warning and per-symbol
    /// problems become `None` for that symbol only.
    pub async fn fetch(&self, symbols: impl IntoIterator<Item = Symbol>) -> QuoteMap {
        let unique = symbols.into_iter().collect::<BTreeSet<_>>();
        if unique.is_empty() {
            debug!("no symbols to price; skipping quote provider");
            return QuoteMap::new();
        }

        let request = match QuoteRequest::new(unique.iter().cloned()) {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error, "invalid quote request; continuing without quotes");
                return QuoteMap::new();
            }
        };

        info!(
            provider = %self.source.id(),
            symbols = request.symbols.len(),
            "fetching quotes"
        );

        let source = &self.source;
        let outcome = self
            .retry
            .run("quote_batch", |_| source.fetch_batch(request.clone()))
            .await;

        let batch = match outcome {
            Ok(batch) => batch,
            Err(failure) => {
                warn!(
                    provider = %self.source.id(),
                    attempts = failure.attempts,
                    error = %failure.error,
                    "quote provider failed; continuing with no quotes for this run"
                );
                return QuoteMap::new();
            }
        };

        self.resolve_all(&request.symbols, &batch)
    }

    fn resolve_all(&self, symbols: &[Symbol], batch: &QuoteBatch) -> QuoteMap {
        symbols
            .iter()
            .map(|symbol| {
                let price = match resolve_price(batch, symbol, self.precision) {
                    Ok(price) => {
                        debug!(symbol = %symbol, price = %price, "resolved quote");
                        Some(price)
                    }
                    Err(failure) => {
                        debug!(symbol = %symbol, reason = ?failure, "no usable quote");
                        None
                    }
                };
                (symbol.clone(), price)
            })
            .collect()
    }
}

/// Resolves the price for one symbol: the last close of the session when it is
/// finite, otherwise the reported last trade price when that is finite.
pub fn resolve_price(
    batch: &QuoteBatch,
    symbol: &Symbol,
    precision: u32,
) -> Result<Decimal, ResolveFailure> {
    match batch.row(symbol) {
        None => Err(ResolveFailure::NotInResponse),
        Some(QuoteRow::Undecodable { reason }) => Err(ResolveFailure::Undecodable(reason.clone())),
        Some(QuoteRow::Series { closes, last_price }) => closes
            .last()
            .copied()
            .flatten()
            .and_then(|close| normalize_price(close, precision))
            .or_else(|| last_price.and_then(|price| normalize_price(price, precision)))
            .ok_or(ResolveFailure::NoUsablePrice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    fn series(closes: Vec<Option<f64>>, last_price: Option<f64>) -> QuoteRow {
        QuoteRow::Series { closes, last_price }
    }

    #[test]
    fn last_close_wins_over_market_price() {
        let batch = QuoteBatch {
            rows: vec![(
                String::from("AAPL"),
                series(vec![Some(149.0), Some(150.123456)], Some(151.0)),
            )],
        };

        assert_eq!(resolve_price(&batch, &symbol("AAPL"), 5), Ok(dec!(150.12346)));
    }

    #[test]
    fn missing_last_close_falls_back_to_market_price() {
        let batch = QuoteBatch {
            rows: vec![(String::from("MSFT"), series(vec![Some(400.0), None], Some(410.5)))],
        };

        assert_eq!(resolve_price(&batch, &symbol("MSFT"), 5), Ok(dec!(410.5)));
    }

    #[test]
    fn non_finite_prices_are_absent() {
        let batch = QuoteBatch {
            rows: vec![(
                String::from("X"),
                series(vec![Some(f64::NAN)], Some(f64::INFINITY)),
            )],
        };

        assert_eq!(
            resolve_price(&batch, &symbol("X"), 5),
            Err(ResolveFailure::NoUsablePrice)
        );
    }

    #[test]
    fn symbols_absent_from_response_are_reported() {
        let batch = QuoteBatch::default();
        assert_eq!(
            resolve_price(&batch, &symbol("NOPE"), 5),
            Err(ResolveFailure::NotInResponse)
        );
    }

    #[test]
    fn undecodable_rows_carry_their_reason() {
        let batch = QuoteBatch {
            rows: vec![(
                String::from("BAD"),
                QuoteRow::Undecodable {
                    reason: String::from("invalid type"),
                },
            )],
        };

        assert_eq!(
            resolve_price(&batch, &symbol("BAD"), 5),
            Err(ResolveFailure::Undecodable(String::from("invalid type")))
        );
    }
}
