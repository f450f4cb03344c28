//! Quote source contract and its request/response types.
//!
//! A [`QuoteSource`] performs exactly one batched upstream call per
//! [`fetch_batch`](QuoteSource::fetch_batch). It returns raw per-symbol
//! rows; turning a row into a price is the fetcher's job, so one malformed
//! row never fails the rest of the batch.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::retry::RetryableError;
use crate::Symbol;

/// Identifier of a quote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Yahoo,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote-provider error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured quote-provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    /// Whole-batch payload that could not be decoded. Retryable.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: true,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl RetryableError for SourceError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Lookback window requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookback {
    /// The most recent trading session.
    #[default]
    OneSession,
}

impl Lookback {
    pub const fn as_range(self) -> &'static str {
        match self {
            Self::OneSession => "1d",
        }
    }
}

/// Request payload for one batched quote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbols: Vec<Symbol>,
    pub lookback: Lookback,
}

impl QuoteRequest {
    /// Deduplicates `symbols` (first occurrence wins) and rejects an empty set.
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Result<Self, SourceError> {
        let mut unique = Vec::new();
        for symbol in symbols {
            if !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }

        if unique.is_empty() {
            return Err(SourceError::invalid_request(
                "quote request must include at least one symbol",
            ));
        }

        Ok(Self {
            symbols: unique,
            lookback: Lookback::OneSession,
        })
    }
}

/// Raw provider data for a single symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteRow {
    /// Decoded session data.
    Series {
        /// Close prices for the session window, oldest first. `None` marks a gap.
        closes: Vec<Option<f64>>,
        /// Last trade price reported alongside the series, if any.
        last_price: Option<f64>,
    },
    /// The provider answered for this symbol but the payload could not be decoded.
    Undecodable { reason: String },
}

/// Response of one batched quote call, keyed by the symbol string the provider echoed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteBatch {
    pub rows: Vec<(String, QuoteRow)>,
}

impl QuoteBatch {
    pub fn row(&self, symbol: &Symbol) -> Option<&QuoteRow> {
        self.rows
            .iter()
            .find(|(echoed, _)| echoed == symbol.as_str())
            .or_else(|| {
                self.rows
                    .iter()
                    .find(|(echoed, _)| echoed.eq_ignore_ascii_case(symbol.as_str()))
            })
            .map(|(_, row)| row)
    }
}

/// Quote provider contract.
///
/// Implementations must be `Send + Sync`; the fetcher shares them behind an `Arc`.
pub trait QuoteSource: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderId;

    /// Performs one batched upstream call for every symbol in `req`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the call as a whole fails (transport,
    /// non-success status, provider-level error). Per-symbol problems are
    /// reported as [`QuoteRow::Undecodable`] or by omitting the symbol.
    fn fetch_batch<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteBatch, SourceError>> + Send + 'a>>;
}
