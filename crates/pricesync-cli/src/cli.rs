//! CLI argument definitions for pricesync.
//!
//! Every setting has a flag and an environment fallback. Secrets are only
//! ever read here, never by the engine itself.
//!
//! # Options
//!
//! | Option | Env | Default |
//! |--------|-----|---------|
//! | `--app-id` | `FEISHU_APP_ID` | required |
//! | `--app-secret` | `FEISHU_APP_SECRET` | required |
//! | `--base-token` | `FEISHU_BASE_TOKEN` | required |
//! | `--table-id` | `PRICESYNC_TABLE_ID` | `tblTFq4Cqsz0SSa1` |
//! | `--write-mode` | `PRICESYNC_WRITE_MODE` | `batch` |
//! | `--price-encoding` | `PRICESYNC_PRICE_ENCODING` | `number` |
//! | `--log-format` | `PRICESYNC_LOG_FORMAT` | `pretty` |
//!
//! # Examples
//!
//! ```bash
//! # One run with secrets from the environment
//! FEISHU_APP_ID=cli_x FEISHU_APP_SECRET=... FEISHU_BASE_TOKEN=bascn... pricesync
//!
//! # Per-record writes paced at 5/s, JSON logs, fail on any rejected write
//! pricesync --write-mode per-record --write-rate 5 --log-format json --strict
//! ```

use clap::{Parser, ValueEnum};

use pricesync_core::config::{
    fixed_retry, DEFAULT_PAGE_SIZE, DEFAULT_PRICE_FIELD, DEFAULT_PRICE_PRECISION,
    DEFAULT_QUOTE_BASE_URL, DEFAULT_STORE_BASE_URL, DEFAULT_SYMBOL_FIELD, DEFAULT_TABLE_ID,
    DEFAULT_TIMEOUT_MS, MAX_STORE_BATCH,
};
use pricesync_core::{ConfigError, PriceEncoding, SyncConfig, WriteMode};

use crate::logging::LogFormat;

/// Reconcile instrument records in a Feishu Bitable table with market quotes.
#[derive(Debug, Parser)]
#[command(name = "pricesync", author, version, about)]
pub struct Cli {
    /// Feishu application id.
    #[arg(long, env = "FEISHU_APP_ID", hide_env_values = true)]
    pub app_id: Option<String>,

    /// Feishu application secret.
    #[arg(long, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Bitable base (app) token that owns the table.
    #[arg(long, env = "FEISHU_BASE_TOKEN", hide_env_values = true)]
    pub base_token: Option<String>,

    /// Table holding the instrument records.
    #[arg(long, env = "PRICESYNC_TABLE_ID", default_value = DEFAULT_TABLE_ID)]
    pub table_id: String,

    /// Field holding each record's symbol.
    #[arg(long, env = "PRICESYNC_SYMBOL_FIELD", default_value = DEFAULT_SYMBOL_FIELD)]
    pub symbol_field: String,

    /// Field receiving the price.
    #[arg(long, env = "PRICESYNC_PRICE_FIELD", default_value = DEFAULT_PRICE_FIELD)]
    pub price_field: String,

    /// How updates are sent to the store.
    #[arg(long, env = "PRICESYNC_WRITE_MODE", value_enum, default_value_t = WriteModeArg::Batch)]
    pub write_mode: WriteModeArg,

    /// Wire representation of the price value.
    #[arg(long, env = "PRICESYNC_PRICE_ENCODING", value_enum, default_value_t = PriceEncodingArg::Number)]
    pub price_encoding: PriceEncodingArg,

    /// Records requested per listing page (1-500).
    #[arg(long, env = "PRICESYNC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Records per bulk update call in batch mode (1-500).
    #[arg(long, env = "PRICESYNC_BATCH_SIZE", default_value_t = MAX_STORE_BATCH)]
    pub batch_size: u32,

    /// Maximum per-record update calls per second.
    #[arg(long = "write-rate", env = "PRICESYNC_WRITE_RATE")]
    pub write_rate_per_sec: Option<u32>,

    /// Total quote request attempts, first one included.
    #[arg(long, env = "PRICESYNC_QUOTE_ATTEMPTS", default_value_t = 3)]
    pub quote_attempts: u32,

    /// Delay between quote request attempts in milliseconds.
    #[arg(long, env = "PRICESYNC_QUOTE_RETRY_DELAY_MS", default_value_t = 2_000)]
    pub quote_retry_delay_ms: u64,

    /// Fractional digits kept on each price.
    #[arg(long, env = "PRICESYNC_PRICE_PRECISION", default_value_t = DEFAULT_PRICE_PRECISION)]
    pub price_precision: u32,

    /// Feishu open API base URL.
    #[arg(long, env = "PRICESYNC_STORE_BASE_URL", default_value = DEFAULT_STORE_BASE_URL)]
    pub store_base_url: String,

    /// Quote provider base URL.
    #[arg(long, env = "PRICESYNC_QUOTE_BASE_URL", default_value = DEFAULT_QUOTE_BASE_URL)]
    pub quote_base_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, env = "PRICESYNC_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Log output format. Logs go to stderr; the level follows `RUST_LOG`.
    #[arg(long, env = "PRICESYNC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Pretty-print the JSON run report.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Exit with code 6 when any write failed.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteModeArg {
    Batch,
    PerRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriceEncodingArg {
    Number,
    Text,
}

impl Cli {
    /// Validates the arguments into a run configuration.
    pub fn to_config(&self) -> Result<SyncConfig, ConfigError> {
        SyncConfig::builder()
            .app_id(self.app_id.clone())
            .app_secret(self.app_secret.clone())
            .base_token(self.base_token.clone())
            .table_id(self.table_id.clone())
            .symbol_field(self.symbol_field.clone())
            .price_field(self.price_field.clone())
            .write_mode(to_write_mode(self.write_mode))
            .price_encoding(to_price_encoding(self.price_encoding))
            .page_size(self.page_size)
            .batch_size(self.batch_size)
            .write_rate_per_sec(self.write_rate_per_sec)
            .quote_retry(fixed_retry(self.quote_attempts, self.quote_retry_delay_ms))
            .price_precision(self.price_precision)
            .store_base_url(self.store_base_url.clone())
            .quote_base_url(self.quote_base_url.clone())
            .timeout_ms(self.timeout_ms)
            .build()
    }
}

fn to_write_mode(value: WriteModeArg) -> WriteMode {
    match value {
        WriteModeArg::Batch => WriteMode::Batch,
        WriteModeArg::PerRecord => WriteMode::PerRecord,
    }
}

fn to_price_encoding(value: PriceEncodingArg) -> PriceEncoding {
    match value {
        PriceEncodingArg::Number => PriceEncoding::Number,
        PriceEncodingArg::Text => PriceEncoding::Text,
    }
}
