//! Run configuration.
//!
//! [`SyncConfig`] is built once through [`SyncConfigBuilder::build`], which
//! validates every setting before the pipeline performs any I/O. Components
//! never read the process environment themselves.

use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::store::PriceEncoding;
use crate::write_back::WriteMode;

pub const DEFAULT_STORE_BASE_URL: &str = "https://open.feishu.cn/open-apis";
pub const DEFAULT_QUOTE_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_TABLE_ID: &str = "tblTFq4Cqsz0SSa1";
pub const DEFAULT_SYMBOL_FIELD: &str = "Code";
pub const DEFAULT_PRICE_FIELD: &str = "fldbbaX8bo";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Upper bound the store accepts for both page size and bulk update size.
pub const MAX_STORE_BATCH: u32 = 500;
pub const DEFAULT_PRICE_PRECISION: u32 = 5;
pub const MAX_PRICE_PRECISION: u32 = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Application identity used to obtain a store access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl Debug for AppCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// Validated settings for one reconciliation run.
#[derive(Clone, PartialEq)]
pub struct SyncConfig {
    pub credentials: AppCredentials,
    pub base_token: String,
    pub table_id: String,
    pub symbol_field: String,
    pub price_field: String,
    pub write_mode: WriteMode,
    pub price_encoding: PriceEncoding,
    pub page_size: u32,
    pub batch_size: usize,
    pub write_rate_per_sec: Option<u32>,
    pub quote_retry: RetryPolicy,
    pub price_precision: u32,
    pub store_base_url: String,
    pub quote_base_url: String,
    pub timeout_ms: u64,
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }
}

impl Debug for SyncConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("credentials", &self.credentials)
            .field("base_token", &"<redacted>")
            .field("table_id", &self.table_id)
            .field("symbol_field", &self.symbol_field)
            .field("price_field", &self.price_field)
            .field("write_mode", &self.write_mode)
            .field("price_encoding", &self.price_encoding)
            .field("page_size", &self.page_size)
            .field("batch_size", &self.batch_size)
            .field("write_rate_per_sec", &self.write_rate_per_sec)
            .field("quote_retry", &self.quote_retry)
            .field("price_precision", &self.price_precision)
            .field("store_base_url", &self.store_base_url)
            .field("quote_base_url", &self.quote_base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Collects settings; [`build`](Self::build) validates them all at once.
#[derive(Debug, Clone)]
pub struct SyncConfigBuilder {
    app_id: Option<String>,
    app_secret: Option<String>,
    base_token: Option<String>,
    table_id: String,
    symbol_field: String,
    price_field: String,
    write_mode: WriteMode,
    price_encoding: PriceEncoding,
    page_size: u32,
    batch_size: u32,
    write_rate_per_sec: Option<u32>,
    quote_retry: RetryPolicy,
    price_precision: u32,
    store_base_url: String,
    quote_base_url: String,
    timeout_ms: u64,
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            base_token: None,
            table_id: String::from(DEFAULT_TABLE_ID),
            symbol_field: String::from(DEFAULT_SYMBOL_FIELD),
            price_field: String::from(DEFAULT_PRICE_FIELD),
            write_mode: WriteMode::default(),
            price_encoding: PriceEncoding::default(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: MAX_STORE_BATCH,
            write_rate_per_sec: None,
            quote_retry: RetryPolicy::default(),
            price_precision: DEFAULT_PRICE_PRECISION,
            store_base_url: String::from(DEFAULT_STORE_BASE_URL),
            quote_base_url: String::from(DEFAULT_QUOTE_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SyncConfigBuilder {
    pub fn app_id(mut self, value: Option<impl Into<String>>) -> Self {
        self.app_id = value.map(Into::into);
        self
    }

    pub fn app_secret(mut self, value: Option<impl Into<String>>) -> Self {
        self.app_secret = value.map(Into::into);
        self
    }

    pub fn base_token(mut self, value: Option<impl Into<String>>) -> Self {
        self.base_token = value.map(Into::into);
        self
    }

    pub fn table_id(mut self, value: impl Into<String>) -> Self {
        self.table_id = value.into();
        self
    }

    pub fn symbol_field(mut self, value: impl Into<String>) -> Self {
        self.symbol_field = value.into();
        self
    }

    pub fn price_field(mut self, value: impl Into<String>) -> Self {
        self.price_field = value.into();
        self
    }

    pub fn write_mode(mut self, value: WriteMode) -> Self {
        self.write_mode = value;
        self
    }

    pub fn price_encoding(mut self, value: PriceEncoding) -> Self {
        self.price_encoding = value;
        self
    }

    pub fn page_size(mut self, value: u32) -> Self {
        self.page_size = value;
        self
    }

    pub fn batch_size(mut self, value: u32) -> Self {
        self.batch_size = value;
        self
    }

    pub fn write_rate_per_sec(mut self, value: Option<u32>) -> Self {
        self.write_rate_per_sec = value;
        self
    }

    pub fn quote_retry(mut self, value: RetryPolicy) -> Self {
        self.quote_retry = value;
        self
    }

    pub fn price_precision(mut self, value: u32) -> Self {
        self.price_precision = value;
        self
    }

    pub fn store_base_url(mut self, value: impl Into<String>) -> Self {
        self.store_base_url = value.into();
        self
    }

    pub fn quote_base_url(mut self, value: impl Into<String>) -> Self {
        self.quote_base_url = value.into();
        self
    }

    pub fn timeout_ms(mut self, value: u64) -> Self {
        self.timeout_ms = value;
        self
    }

    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let app_id = required_secret("app_id", self.app_id)?;
        let app_secret = required_secret("app_secret", self.app_secret)?;
        let base_token = required_secret("base_token", self.base_token)?;

        let table_id = non_blank("table_id", self.table_id)?;
        let symbol_field = non_blank("symbol_field", self.symbol_field)?;
        let price_field = non_blank("price_field", self.price_field)?;

        in_range("page_size", u64::from(self.page_size), 1, u64::from(MAX_STORE_BATCH))?;
        in_range("batch_size", u64::from(self.batch_size), 1, u64::from(MAX_STORE_BATCH))?;
        if let Some(rate) = self.write_rate_per_sec {
            in_range("write_rate_per_sec", u64::from(rate), 1, 1_000)?;
        }
        in_range("quote_max_attempts", u64::from(self.quote_retry.max_attempts), 1, 10)?;
        in_range(
            "price_precision",
            u64::from(self.price_precision),
            0,
            u64::from(MAX_PRICE_PRECISION),
        )?;
        in_range("timeout_ms", self.timeout_ms, 100, 300_000)?;

        let store_base_url = http_url("store_base_url", self.store_base_url)?;
        let quote_base_url = http_url("quote_base_url", self.quote_base_url)?;

        Ok(SyncConfig {
            credentials: AppCredentials { app_id, app_secret },
            base_token,
            table_id,
            symbol_field,
            price_field,
            write_mode: self.write_mode,
            price_encoding: self.price_encoding,
            page_size: self.page_size,
            batch_size: self.batch_size as usize,
            write_rate_per_sec: self.write_rate_per_sec,
            quote_retry: self.quote_retry,
            price_precision: self.price_precision,
            store_base_url,
            quote_base_url,
            timeout_ms: self.timeout_ms,
        })
    }
}

/// Convenience for fixed-delay quote retries expressed in milliseconds.
pub fn fixed_retry(max_attempts: u32, delay_ms: u64) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::from_millis(delay_ms))
}

fn required_secret(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(ConfigError::MissingSecret { name }),
    }
}

fn non_blank(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::BlankSetting { name });
    }
    Ok(trimmed.to_owned())
}

fn in_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn http_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    let has_scheme = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    let has_host = trimmed
        .split_once("://")
        .map(|(_, rest)| !rest.is_empty())
        .unwrap_or(false);
    if !has_scheme || !has_host {
        return Err(ConfigError::InvalidUrl { name, value });
    }
    Ok(trimmed.to_owned())
}
