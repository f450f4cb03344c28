//! Applies update intents to the record store and tallies the outcome.
//!
//! Write failures never abort a run. In [`WriteMode::Batch`] a rejected call
//! marks every record of that call as failed; in [`WriteMode::PerRecord`] each
//! record succeeds or fails on its own and calls are optionally paced.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SyncConfig, DEFAULT_PRICE_PRECISION, MAX_STORE_BATCH};
use crate::domain::UpdateIntent;
use crate::store::{PriceEncoding, RecordStore, RecordUpdate};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// How intents are sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Bulk calls of up to `batch_size` records each.
    #[default]
    Batch,
    /// One call per record.
    PerRecord,
}

impl WriteMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::PerRecord => "per-record",
        }
    }
}

/// Write outcome counters. `attempted == succeeded + failed` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WriteTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Record ids whose write failed, in intent order.
    pub failed_records: Vec<String>,
}

impl WriteTally {
    fn record_success(&mut self, count: usize) {
        self.attempted += count;
        self.succeeded += count;
    }

    fn record_failure<'a>(&mut self, record_ids: impl IntoIterator<Item = &'a str>) {
        for record_id in record_ids {
            self.attempted += 1;
            self.failed += 1;
            self.failed_records.push(record_id.to_owned());
        }
    }
}

/// Sends intents to a [`RecordStore`].
#[derive(Clone)]
pub struct WriteBack {
    store: Arc<dyn RecordStore>,
    price_field: String,
    mode: WriteMode,
    batch_size: usize,
    encoding: PriceEncoding,
    precision: u32,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl WriteBack {
    pub fn new(store: Arc<dyn RecordStore>, price_field: impl Into<String>) -> Self {
        Self {
            store,
            price_field: price_field.into(),
            mode: WriteMode::default(),
            batch_size: MAX_STORE_BATCH as usize,
            encoding: PriceEncoding::default(),
            precision: DEFAULT_PRICE_PRECISION,
            limiter: None,
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, config: &SyncConfig) -> Self {
        Self::new(store, config.price_field.clone())
            .with_mode(config.write_mode)
            .with_batch_size(config.batch_size)
            .with_encoding(config.price_encoding, config.price_precision)
            .with_rate_per_sec(config.write_rate_per_sec)
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_encoding(mut self, encoding: PriceEncoding, precision: u32) -> Self {
        self.encoding = encoding;
        self.precision = precision;
        self
    }

    /// Paces per-record calls to at most `rate` per second. `None` or zero disables pacing.
    pub fn with_rate_per_sec(mut self, rate: Option<u32>) -> Self {
        self.limiter = rate
            .and_then(NonZeroU32::new)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        self
    }

    pub const fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Applies every intent and reports how many writes succeeded.
    pub async fn apply(&self, intents: &[UpdateIntent]) -> WriteTally {
        if intents.is_empty() {
            debug!("no update intents; skipping write-back");
            return WriteTally::default();
        }

        let updates = intents
            .iter()
            .map(|intent| {
                RecordUpdate::from_intent(intent, &self.price_field, self.encoding, self.precision)
            })
            .collect::<Vec<_>>();

        let tally = match self.mode {
            WriteMode::Batch => self.apply_batched(&updates).await,
            WriteMode::PerRecord => self.apply_per_record(&updates).await,
        };

        info!(
            mode = self.mode.as_str(),
            attempted = tally.attempted,
            succeeded = tally.succeeded,
            failed = tally.failed,
            "write-back finished"
        );
        tally
    }

    async fn apply_batched(&self, updates: &[RecordUpdate]) -> WriteTally {
        let mut tally = WriteTally::default();

        for (index, chunk) in updates.chunks(self.batch_size).enumerate() {
            match self.store.batch_update(chunk).await {
                Ok(()) => {
                    debug!(chunk = index, records = chunk.len(), "batch update applied");
                    tally.record_success(chunk.len());
                }
                Err(error) => {
                    warn!(
                        chunk = index,
                        records = chunk.len(),
                        error = %error,
                        "batch update rejected; every record in the chunk counts as failed"
                    );
                    tally.record_failure(chunk.iter().map(|update| update.record_id.as_str()));
                }
            }
        }

        tally
    }

    async fn apply_per_record(&self, updates: &[RecordUpdate]) -> WriteTally {
        let mut tally = WriteTally::default();

        for update in updates {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            match self.store.update_record(update).await {
                Ok(()) => {
                    debug!(record_id = %update.record_id, "record updated");
                    tally.record_success(1);
                }
                Err(error) => {
                    warn!(record_id = %update.record_id, error = %error, "record update failed");
                    tally.record_failure([update.record_id.as_str()]);
                }
            }
        }

        tally
    }
}

impl std::fmt::Debug for WriteBack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBack")
            .field("price_field", &self.price_field)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("encoding", &self.encoding)
            .field("paced", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}
