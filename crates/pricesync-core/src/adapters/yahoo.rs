use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::data_source::{ProviderId, QuoteBatch, QuoteRequest, QuoteRow, QuoteSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};

const REFERER: &str = "https://finance.yahoo.com/";

/// Yahoo Finance adapter backed by the batched spark endpoint.
///
/// One request covers every symbol: `/v7/finance/spark?symbols=A,B&range=1d&interval=1d`.
#[derive(Clone)]
pub struct YahooQuoteSource {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl YahooQuoteSource {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn spark_url(&self, req: &QuoteRequest) -> String {
        let symbols_param = req
            .symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}/v7/finance/spark?symbols={}&range={}&interval=1d",
            self.base_url,
            urlencoding::encode(&symbols_param),
            req.lookback.as_range(),
        )
    }

    async fn fetch_spark(&self, req: &QuoteRequest) -> Result<QuoteBatch, SourceError> {
        let request = HttpRequest::get(self.spark_url(req))
            .with_header("referer", REFERER)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.retryable() {
                SourceError::unavailable(format!("yahoo transport error: {}", e.message()))
            } else {
                SourceError::invalid_request(format!("yahoo transport error: {}", e.message()))
            }
        })?;

        check_status(&response)?;
        parse_spark_response(&response.body)
    }
}

impl QuoteSource for YahooQuoteSource {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch_batch<'a>(
        &'a self,
        req: QuoteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteBatch, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if req.symbols.is_empty() {
                return Err(SourceError::invalid_request(
                    "yahoo quote request requires at least one symbol",
                ));
            }

            debug!(symbols = req.symbols.len(), "requesting yahoo spark batch");
            self.fetch_spark(&req).await
        })
    }
}

fn check_status(response: &HttpResponse) -> Result<(), SourceError> {
    match response.status {
        status if (200..300).contains(&status) => Ok(()),
        429 => Err(SourceError::rate_limited("yahoo returned status 429")),
        status @ (408 | 500..=599) => Err(SourceError::unavailable(format!(
            "yahoo returned status {status}"
        ))),
        status => Err(SourceError::invalid_request(format!(
            "yahoo returned status {status}"
        ))),
    }
}

/// Decodes a spark payload. Each result element is decoded on its own so a
/// malformed element only affects its own symbol.
fn parse_spark_response(body: &str) -> Result<QuoteBatch, SourceError> {
    let response: YahooSparkResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo response: {e}")))?;

    if let Some(error) = response.spark.error.filter(|error| !error.is_null()) {
        return Err(SourceError::unavailable(format!("yahoo API error: {error}")));
    }

    let mut rows = Vec::new();
    for element in response.spark.result.unwrap_or_default() {
        let Some(symbol) = element.get("symbol").and_then(Value::as_str).map(str::to_owned) else {
            debug!("skipping yahoo spark element without a symbol");
            continue;
        };

        let row = match serde_json::from_value::<YahooSparkResult>(element) {
            Ok(result) => result.into_row(),
            Err(error) => QuoteRow::Undecodable {
                reason: error.to_string(),
            },
        };
        rows.push((symbol, row));
    }

    Ok(QuoteBatch { rows })
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSparkResponse {
    spark: YahooSparkData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSparkData {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSparkResult {
    #[serde(default)]
    response: Vec<YahooChartResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooChartMeta>,
    #[serde(default)]
    indicators: Option<YahooChartIndicators>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl YahooSparkResult {
    fn into_row(self) -> QuoteRow {
        let Some(chart) = self.response.into_iter().next() else {
            return QuoteRow::Series {
                closes: Vec::new(),
                last_price: None,
            };
        };

        let last_price = chart.meta.and_then(|meta| meta.regular_market_price);
        let closes = chart
            .indicators
            .and_then(|indicators| indicators.quote.into_iter().next())
            .map(|quote| quote.close)
            .unwrap_or_default();

        QuoteRow::Series { closes, last_price }
    }
}
