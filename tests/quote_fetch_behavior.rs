//! Behavior-driven tests for quote fetching
//!
//! These tests verify HOW the fetcher behaves when the quote provider
//! succeeds, partially answers, or keeps failing.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pricesync_core::{
    fixed_retry, ProviderId, QuoteBatch, QuoteFetcher, QuoteMap, QuoteRequest, QuoteRow,
    QuoteSource, RetryPolicy, SourceError, Symbol,
};
use rust_decimal_macros::dec;

/// Replays scripted batch outcomes and records every request it receives.
struct ScriptedSource {
    outcomes: Mutex<VecDeque<Result<QuoteBatch, SourceError>>>,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl ScriptedSource {
    fn new(outcomes: Vec<Result<QuoteBatch, SourceError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().expect("not poisoned").len()
    }

    fn requested_symbols(&self, call: usize) -> Vec<String> {
        self.requests.lock().expect("not poisoned")[call]
            .symbols
            .iter()
            .map(|s| s.as_str().to_owned())
            .collect()
    }
}

impl QuoteSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch_batch<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteBatch, SourceError>> + Send + 'a>> {
        self.requests.lock().expect("not poisoned").push(req);
        let outcome = self
            .outcomes
            .lock()
            .expect("not poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::unavailable("script exhausted")));
        Box::pin(async move { outcome })
    }
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

fn series(symbol: &str, close: Option<f64>, last_price: Option<f64>) -> (String, QuoteRow) {
    (
        symbol.to_owned(),
        QuoteRow::Series {
            closes: vec![close],
            last_price,
        },
    )
}

fn instant_retries() -> RetryPolicy {
    fixed_retry(3, 0)
}

// =============================================================================
// Quote fetch: provider keeps failing
// =============================================================================

#[tokio::test]
async fn when_provider_fails_every_attempt_fetch_returns_an_empty_map() {
    // Given: A provider that is down for all three attempts
    let source = Arc::new(ScriptedSource::new(vec![
        Err(SourceError::unavailable("status 503")),
        Err(SourceError::rate_limited("status 429")),
        Err(SourceError::unavailable("status 502")),
    ]));
    let fetcher = QuoteFetcher::new(source.clone(), instant_retries(), 5);

    // When: Quotes are fetched
    let quotes = fetcher.fetch([symbol("AAPL"), symbol("MSFT")]).await;

    // Then: The whole batch degrades to no quotes after exactly three attempts
    assert!(quotes.is_empty());
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn when_provider_recovers_on_a_later_attempt_quotes_are_returned() {
    // Given: A provider that fails twice then answers
    let source = Arc::new(ScriptedSource::new(vec![
        Err(SourceError::unavailable("timeout")),
        Err(SourceError::internal("html error page")),
        Ok(QuoteBatch {
            rows: vec![series("AAPL", Some(150.12345), None)],
        }),
    ]));
    let fetcher = QuoteFetcher::new(source.clone(), instant_retries(), 5);

    // When: Quotes are fetched
    let quotes = fetcher.fetch([symbol("AAPL")]).await;

    // Then: The third attempt's data is used
    assert_eq!(quotes, QuoteMap::from([(symbol("AAPL"), Some(dec!(150.12345)))]));
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn when_request_is_rejected_as_invalid_no_retry_is_made() {
    // Given: A provider that rejects the request outright
    let source = Arc::new(ScriptedSource::new(vec![Err(SourceError::invalid_request(
        "status 404",
    ))]));
    let fetcher = QuoteFetcher::new(source.clone(), instant_retries(), 5);

    // When: Quotes are fetched
    let quotes = fetcher.fetch([symbol("ZZZZ")]).await;

    // Then: The fetcher gives up after one call
    assert!(quotes.is_empty());
    assert_eq!(source.calls(), 1);
}

// =============================================================================
// Quote fetch: partial answers
// =============================================================================

#[tokio::test]
async fn when_provider_answers_for_some_symbols_only_the_missing_ones_are_none() {
    // Given: A batch covering AAPL but not GONE, and an unusable BAD row
    let source = Arc::new(ScriptedSource::new(vec![Ok(QuoteBatch {
        rows: vec![
            series("AAPL", Some(150.123456), Some(151.0)),
            series("BAD", Some(f64::NAN), None),
            series("MSFT", None, Some(410.5)),
        ],
    })]));
    let fetcher = QuoteFetcher::new(source, instant_retries(), 5);

    // When: Quotes are fetched for four symbols
    let quotes = fetcher
        .fetch([symbol("AAPL"), symbol("BAD"), symbol("GONE"), symbol("MSFT")])
        .await;

    // Then: Every requested symbol has an entry; only usable ones carry a price
    assert_eq!(
        quotes,
        QuoteMap::from([
            (symbol("AAPL"), Some(dec!(150.12346))),
            (symbol("BAD"), None),
            (symbol("GONE"), None),
            (symbol("MSFT"), Some(dec!(410.5))),
        ])
    );
}

#[tokio::test]
async fn returned_keys_are_a_subset_of_the_request_and_prices_are_rounded() {
    // Given: A provider echoing an extra symbol nobody asked for
    let source = Arc::new(ScriptedSource::new(vec![Ok(QuoteBatch {
        rows: vec![
            series("AAPL", Some(1.0 / 3.0), None),
            series("EXTRA", Some(9.0), None),
        ],
    })]));
    let fetcher = QuoteFetcher::new(source, instant_retries(), 5);

    // When: Only AAPL is requested
    let quotes = fetcher.fetch([symbol("AAPL")]).await;

    // Then: Only AAPL comes back, at five fractional digits
    assert_eq!(quotes.len(), 1);
    let price = quotes[&symbol("AAPL")].expect("priced");
    assert_eq!(price, dec!(0.33333));
    assert!(price.scale() <= 5);
}

// =============================================================================
// Quote fetch: batching
// =============================================================================

#[tokio::test]
async fn duplicate_symbols_are_requested_once() {
    // Given: Three records sharing two symbols
    let source = Arc::new(ScriptedSource::new(vec![Ok(QuoteBatch::default())]));
    let fetcher = QuoteFetcher::new(source.clone(), RetryPolicy::no_retry(), 5);

    // When: Quotes are fetched
    fetcher
        .fetch([symbol("MSFT"), symbol("AAPL"), symbol("MSFT")])
        .await;

    // Then: One call carries each symbol once
    assert_eq!(source.calls(), 1);
    assert_eq!(source.requested_symbols(0), vec!["AAPL", "MSFT"]);
}

#[tokio::test]
async fn no_symbols_means_no_provider_call() {
    // Given: A table where no record has a symbol
    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let fetcher = QuoteFetcher::new(source.clone(), instant_retries(), 5);

    // When: Quotes are fetched for nothing
    let quotes = fetcher.fetch(Vec::<Symbol>::new()).await;

    // Then: The provider is never contacted
    assert!(quotes.is_empty());
    assert_eq!(source.calls(), 0);
}
