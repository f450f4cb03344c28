use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SyncConfig;
use crate::domain::Record;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::store::{AppTokenProvider, RecordStore, RecordUpdate, StoreError};

/// API codes the store uses for a missing, invalid or expired access token.
const TOKEN_REJECTED_CODES: [i64; 4] = [99_991_661, 99_991_663, 99_991_664, 99_991_668];

/// Feishu Bitable table accessed through the open API.
pub struct BitableStore {
    http_client: Arc<dyn HttpClient>,
    tokens: AppTokenProvider,
    base_url: String,
    base_token: String,
    table_id: String,
    page_size: u32,
    timeout_ms: u64,
}

impl BitableStore {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        tokens: AppTokenProvider,
        base_url: impl Into<String>,
        base_token: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            base_token: base_token.into(),
            table_id: table_id.into(),
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
        }
    }

    /// Store for the table named in `config`, authenticating with its credentials.
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &SyncConfig) -> Self {
        let tokens = AppTokenProvider::new(
            Arc::clone(&http_client),
            config.store_base_url.clone(),
            config.credentials.clone(),
        )
        .with_timeout_ms(config.timeout_ms);

        Self::new(
            http_client,
            tokens,
            config.store_base_url.clone(),
            config.base_token.clone(),
            config.table_id.clone(),
        )
        .with_page_size(config.page_size)
        .with_timeout_ms(config.timeout_ms)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn records_url(&self) -> String {
        format!(
            "{}/bitable/v1/apps/{}/tables/{}/records",
            self.base_url,
            urlencoding::encode(&self.base_token),
            urlencoding::encode(&self.table_id),
        )
    }

    fn page_url(&self, page_token: Option<&str>) -> String {
        let mut url = format!("{}?page_size={}", self.records_url(), self.page_size);
        if let Some(token) = page_token {
            url.push_str("&page_token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    async fn authorized(&self, request: HttpRequest) -> Result<HttpRequest, StoreError> {
        let token = self.tokens.token().await?;
        Ok(request
            .with_auth(&HttpAuth::BearerToken(token))
            .with_timeout_ms(self.timeout_ms))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StoreError> {
        self.http_client
            .execute(request)
            .await
            .map_err(|e| StoreError::transport(format!("store request failed: {}", e.message())))
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListPage, StoreError> {
        let request = self.authorized(HttpRequest::get(self.page_url(page_token))).await?;
        let response = self.send(request).await?;
        let page = decode_envelope::<ListPage>(&response, StoreError::read)?;
        Ok(page.unwrap_or_default())
    }

    async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            let items = page.items.unwrap_or_default();
            debug!(
                items = items.len(),
                has_more = page.has_more,
                "fetched record page"
            );
            records.extend(items);

            if !page.has_more {
                break;
            }

            let next = page
                .page_token
                .filter(|token| !token.is_empty())
                .ok_or_else(|| StoreError::read("store reported more pages without a page token"))?;
            if !seen_tokens.insert(next.clone()) {
                return Err(StoreError::read(format!(
                    "store repeated page token '{next}'"
                )));
            }
            page_token = Some(next);
        }

        Ok(records)
    }

    async fn send_batch(&self, updates: &[RecordUpdate]) -> Result<(), StoreError> {
        let url = format!("{}/batch_update", self.records_url());
        let payload = BatchUpdateBody { records: updates };
        let request = HttpRequest::post(url)
            .with_json(&payload)
            .map_err(|e| StoreError::write(format!("failed to encode batch update: {e}")))?;
        let request = self.authorized(request).await?;
        let response = self.send(request).await?;
        decode_envelope::<serde_json::Value>(&response, StoreError::write)?;
        Ok(())
    }

    async fn send_single(&self, update: &RecordUpdate) -> Result<(), StoreError> {
        let url = format!(
            "{}/{}",
            self.records_url(),
            urlencoding::encode(&update.record_id)
        );
        let payload = SingleUpdateBody {
            fields: &update.fields,
        };
        let request = HttpRequest::put(url)
            .with_json(&payload)
            .map_err(|e| StoreError::write(format!("failed to encode record update: {e}")))?;
        let request = self.authorized(request).await?;
        let response = self.send(request).await?;
        decode_envelope::<serde_json::Value>(&response, StoreError::write)?;
        Ok(())
    }
}

impl RecordStore for BitableStore {
    fn list_records<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, StoreError>> + Send + 'a>> {
        Box::pin(self.list_all())
    }

    fn batch_update<'a>(
        &'a self,
        updates: &'a [RecordUpdate],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if updates.is_empty() {
                return Ok(());
            }
            self.send_batch(updates).await
        })
    }

    fn update_record<'a>(
        &'a self,
        update: &'a RecordUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.send_single(update))
    }
}

impl std::fmt::Debug for BitableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitableStore")
            .field("base_url", &self.base_url)
            .field("table_id", &self.table_id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Checks status and API code, then decodes `data`.
///
/// Token rejections become auth errors; everything else uses `classify`.
fn decode_envelope<T: DeserializeOwned>(
    response: &HttpResponse,
    classify: fn(String) -> StoreError,
) -> Result<Option<T>, StoreError> {
    let envelope = serde_json::from_str::<Envelope<T>>(&response.body);

    match envelope {
        Ok(envelope) if response.is_success() && envelope.code == 0 => Ok(envelope.data),
        Ok(envelope) => {
            let error = if TOKEN_REJECTED_CODES.contains(&envelope.code) {
                StoreError::auth(format!("access token rejected: {}", envelope.msg))
            } else {
                classify(format!("store rejected request: {}", envelope.msg))
            };
            Err(error
                .with_status(response.status)
                .with_api_code(envelope.code))
        }
        Err(_) if matches!(response.status, 401 | 403) => {
            Err(StoreError::auth("access token rejected").with_status(response.status))
        }
        Err(_) if !response.is_success() => {
            Err(classify(String::from("store request failed")).with_status(response.status))
        }
        Err(e) => Err(StoreError::decode(format!(
            "failed to parse store response: {e}"
        ))),
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Option<Vec<Record>>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Serialize)]
struct BatchUpdateBody<'a> {
    records: &'a [RecordUpdate],
}

#[derive(Serialize)]
struct SingleUpdateBody<'a> {
    fields: &'a serde_json::Map<String, serde_json::Value>,
}
