//! # Pricesync Core
//!
//! Price reconciliation engine: reads instrument records from a Feishu
//! Bitable table, prices their symbols through one batched quote request and
//! writes the prices back.
//!
//! ## Overview
//!
//! - **Symbol extraction** that turns any field shape into a symbol or `None`
//! - **Batched quote retrieval** with a bounded retry policy and per-symbol isolation
//! - **Reconciliation** of records against quotes into ordered update intents
//! - **Write-back** in batch or per-record mode with a success/failure tally
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Quote provider adapters (Yahoo Finance) |
//! | [`config`] | Validated run configuration |
//! | [`data_source`] | Quote source trait and request/batch types |
//! | [`domain`] | Records, symbols, update intents |
//! | [`error`] | Configuration and run-level errors |
//! | [`fetcher`] | Quote fetcher |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pipeline`] | Run state machine and report |
//! | [`reconcile`] | Record/quote join |
//! | [`retry`] | Bounded retry policy |
//! | [`store`] | Record store trait and Bitable client |
//! | [`write_back`] | Write-back coordinator |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pricesync_core::{ReqwestHttpClient, SyncConfig, SyncPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::builder()
//!         .app_id(std::env::var("FEISHU_APP_ID").ok())
//!         .app_secret(std::env::var("FEISHU_APP_SECRET").ok())
//!         .base_token(std::env::var("FEISHU_BASE_TOKEN").ok())
//!         .build()?;
//!
//!     let pipeline = SyncPipeline::with_http_client(config, Arc::new(ReqwestHttpClient::new()?));
//!     let report = pipeline.run().await?;
//!     println!("{} of {} updates applied", report.result.updates.succeeded, report.result.updates.attempted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   records   ┌────────────┐  symbols  ┌──────────────┐
//! │ RecordStore │────────────▶│ Extract    │──────────▶│ QuoteFetcher │
//! └──────▲──────┘             └────────────┘           └──────┬───────┘
//!        │                                                    │ QuoteMap
//!        │ updates  ┌────────────┐  intents  ┌────────────┐   │
//!        └──────────│ WriteBack  │◀──────────│ Reconcile  │◀──┘
//!                   └────────────┘           └────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod write_back;

pub use adapters::YahooQuoteSource;
pub use config::{fixed_retry, AppCredentials, SyncConfig, SyncConfigBuilder};
pub use data_source::{
    Lookback, ProviderId, QuoteBatch, QuoteRequest, QuoteRow, QuoteSource, SourceError,
    SourceErrorKind,
};
pub use domain::{extract_symbol, normalize_price, QuoteMap, Record, Symbol, UpdateIntent};
pub use error::{ConfigError, SyncError};
pub use fetcher::{resolve_price, QuoteFetcher, ResolveFailure};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use pipeline::{RunReport, RunState, SyncPipeline};
pub use reconcile::{collect_symbols, reconcile, ReconciliationResult};
pub use retry::{Backoff, RetryFailure, RetryPolicy, RetryableError};
pub use store::{
    AppTokenProvider, BitableStore, PriceEncoding, RecordStore, RecordUpdate, StoreError,
    StoreErrorKind,
};
pub use write_back::{WriteBack, WriteMode, WriteTally};
