//! One reconciliation run: extract, fetch, reconcile, write.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::adapters::YahooQuoteSource;
use crate::config::SyncConfig;
use crate::data_source::QuoteSource;
use crate::error::SyncError;
use crate::fetcher::QuoteFetcher;
use crate::http_client::HttpClient;
use crate::reconcile::{collect_symbols, reconcile, ReconciliationResult};
use crate::store::{BitableStore, RecordStore};
use crate::write_back::{WriteBack, WriteMode};

/// Run lifecycle. `Failed` is only reachable through a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Extract,
    Fetch,
    Reconcile,
    Write,
    Done,
    Failed,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Extract => "extract",
            Self::Fetch => "fetch",
            Self::Reconcile => "reconcile",
            Self::Write => "write",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Summary emitted once per completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub write_mode: WriteMode,
    pub state: RunState,
    #[serde(flatten)]
    pub result: ReconciliationResult,
}

impl RunReport {
    pub fn has_failed_writes(&self) -> bool {
        self.result.updates.failed > 0
    }
}

/// Owns the collaborators of a run. Built once from a validated [`SyncConfig`].
pub struct SyncPipeline {
    config: SyncConfig,
    store: Arc<dyn RecordStore>,
    fetcher: QuoteFetcher,
    write_back: WriteBack,
}

impl SyncPipeline {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn RecordStore>,
        source: Arc<dyn QuoteSource>,
    ) -> Self {
        let fetcher = QuoteFetcher::new(source, config.quote_retry.clone(), config.price_precision);
        let write_back = WriteBack::from_config(Arc::clone(&store), &config);
        Self {
            config,
            store,
            fetcher,
            write_back,
        }
    }

    /// Wires the Feishu Bitable store and the Yahoo Finance source onto `http_client`.
    pub fn with_http_client(config: SyncConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let store = Arc::new(BitableStore::from_config(Arc::clone(&http_client), &config));
        let source = Arc::new(
            YahooQuoteSource::new(http_client, config.quote_base_url.clone())
                .with_timeout_ms(config.timeout_ms),
        );
        Self::new(config, store, source)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Executes the run. Only authentication and listing failures are fatal;
    /// quote and write problems are reflected in the report.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let run_id = Uuid::new_v4();
        let started_at = OffsetDateTime::now_utc();
        info!(run_id = %run_id, table_id = %self.config.table_id, "starting price sync");

        enter(run_id, RunState::Extract);
        let records = match self.store.list_records().await {
            Ok(records) => records,
            Err(store_error) => {
                let sync_error = SyncError::from_read(store_error);
                error!(
                    run_id = %run_id,
                    state = RunState::Failed.as_str(),
                    code = sync_error.code(),
                    error = %sync_error,
                    "run aborted"
                );
                return Err(sync_error);
            }
        };
        let symbols = collect_symbols(&records, &self.config.symbol_field);
        info!(
            run_id = %run_id,
            records = records.len(),
            symbols = symbols.len(),
            "extracted symbols"
        );

        enter(run_id, RunState::Fetch);
        let quotes = self.fetcher.fetch(symbols).await;

        enter(run_id, RunState::Reconcile);
        let result = reconcile(&records, &quotes, &self.config.symbol_field);
        info!(
            run_id = %run_id,
            intents = result.intents.len(),
            quotes_resolved = result.quotes_resolved,
            "reconciled records"
        );

        enter(run_id, RunState::Write);
        let updates = self.write_back.apply(&result.intents).await;
        let result = result.with_updates(updates);

        enter(run_id, RunState::Done);
        info!(
            run_id = %run_id,
            succeeded = result.updates.succeeded,
            failed = result.updates.failed,
            "price sync finished"
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            write_mode: self.write_back.mode(),
            state: RunState::Done,
            result,
        })
    }
}

fn enter(run_id: Uuid, state: RunState) {
    info!(run_id = %run_id, state = state.as_str(), "entering state");
}
