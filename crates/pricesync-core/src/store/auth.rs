use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AppCredentials;
use crate::http_client::{HttpClient, HttpRequest};
use crate::store::StoreError;

/// Tokens are refreshed this long before the store says they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Exchanges application credentials for an app access token and caches it.
///
/// The cache lock is held across the exchange so concurrent callers share a
/// single refresh.
pub struct AppTokenProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    credentials: AppCredentials,
    timeout_ms: u64,
    cached: Mutex<Option<CachedToken>>,
}

impl AppTokenProvider {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        credentials: AppCredentials,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            credentials,
            timeout_ms: 10_000,
            cached: Mutex::new(None),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Returns a valid token, exchanging credentials when none is cached or
    /// the cached one is about to expire.
    pub async fn token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token so the next call performs a new exchange.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn exchange(&self) -> Result<CachedToken, StoreError> {
        let url = format!("{}/auth/v3/app_access_token/internal", self.base_url);
        let payload = TokenRequest {
            app_id: &self.credentials.app_id,
            app_secret: &self.credentials.app_secret,
        };
        let request = HttpRequest::post(url)
            .with_json(&payload)
            .map_err(|e| StoreError::auth(format!("failed to encode token request: {e}")))?
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| StoreError::auth(format!("token exchange failed: {}", e.message())))?;

        if !response.is_success() {
            return Err(StoreError::auth("token exchange rejected").with_status(response.status));
        }

        let body: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| StoreError::auth(format!("failed to parse token response: {e}")))?;

        if body.code != 0 {
            return Err(StoreError::auth(format!("token exchange rejected: {}", body.msg))
                .with_api_code(body.code));
        }

        let value = body
            .app_access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StoreError::auth("token response carried no app_access_token"))?;

        let lifetime = Duration::from_secs(body.expire);
        debug!(expires_in_secs = body.expire, "obtained app access token");

        Ok(CachedToken {
            value,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

impl std::fmt::Debug for AppTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppTokenProvider")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    app_access_token: Option<String>,
    #[serde(default)]
    expire: u64,
}
