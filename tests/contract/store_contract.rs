use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use pricesync_core::{
    AppCredentials, AppTokenProvider, BitableStore, HttpClient, HttpError, HttpMethod,
    HttpRequest, HttpResponse, Record, RecordStore, RecordUpdate, StoreErrorKind,
};
use serde_json::{json, Map, Value};

const BASE_URL: &str = "http://bitable.local/open-apis";
const RECORDS_PATH: &str = "/bitable/v1/apps/bascnBase/tables/tblPrices/records";

/// In-memory emulation of the Bitable records API.
struct FakeBitable {
    records: Mutex<Vec<Record>>,
    store_calls: Mutex<usize>,
}

impl FakeBitable {
    fn with_codes(codes: &[&str]) -> Self {
        let records = codes
            .iter()
            .enumerate()
            .map(|(index, code)| {
                let mut fields = Map::new();
                fields.insert(String::from("Code"), json!(code));
                Record::new(format!("rec{index}"), fields)
            })
            .collect();
        Self {
            records: Mutex::new(records),
            store_calls: Mutex::new(0),
        }
    }

    fn field(&self, record_id: &str, field: &str) -> Option<Value> {
        self.records
            .lock()
            .expect("not poisoned")
            .iter()
            .find(|r| r.record_id == record_id)
            .and_then(|r| r.field(field).cloned())
    }

    fn store_calls(&self) -> usize {
        *self.store_calls.lock().expect("not poisoned")
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        if request.url.ends_with("/auth/v3/app_access_token/internal") {
            return ok(json!(null), Some("t-fake"));
        }
        *self.store_calls.lock().expect("not poisoned") += 1;

        if request.headers.get("authorization").map(String::as_str) != Some("Bearer t-fake") {
            return failure(400, 99_991_661, "Missing access token");
        }

        let Some(path) = request.url.strip_prefix(BASE_URL) else {
            return failure(404, 404, "unknown host");
        };
        let (path, query) = path.split_once('?').unwrap_or((path, ""));

        match (request.method, path) {
            (HttpMethod::Get, RECORDS_PATH) => self.list(query),
            (HttpMethod::Post, p) if p == format!("{RECORDS_PATH}/batch_update") => {
                self.batch_update(request)
            }
            (HttpMethod::Put, p) => match p.strip_prefix(&format!("{RECORDS_PATH}/")) {
                Some(record_id) => self.update_one(record_id, request),
                None => failure(404, 404, "not found"),
            },
            _ => failure(404, 404, "not found"),
        }
    }

    fn list(&self, query: &str) -> HttpResponse {
        let param = |name: &str| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_owned())
        };
        let page_size = param("page_size")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(20);
        let offset = param("page_token")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let records = self.records.lock().expect("not poisoned");
        let end = (offset + page_size).min(records.len());
        let items = records[offset..end].to_vec();
        let has_more = end < records.len();
        ok(
            json!({
                "items": items,
                "has_more": has_more,
                "page_token": has_more.then(|| end.to_string()),
                "total": records.len()
            }),
            None,
        )
    }

    fn batch_update(&self, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap_or("{}"))
            .unwrap_or(Value::Null);
        let updates = body["records"].as_array().cloned().unwrap_or_default();

        let mut records = self.records.lock().expect("not poisoned");
        let all_known = updates.iter().all(|update| {
            records
                .iter()
                .any(|r| Some(r.record_id.as_str()) == update["record_id"].as_str())
        });
        if !all_known {
            return failure(400, 1_254_043, "RecordIdNotFound");
        }

        for update in updates {
            let id = update["record_id"].as_str().unwrap_or_default();
            if let Some(record) = records.iter_mut().find(|r| r.record_id == id) {
                merge(record, &update["fields"]);
            }
        }
        ok(json!({ "records": [] }), None)
    }

    fn update_one(&self, record_id: &str, request: &HttpRequest) -> HttpResponse {
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap_or("{}"))
            .unwrap_or(Value::Null);
        let mut records = self.records.lock().expect("not poisoned");
        match records.iter_mut().find(|r| r.record_id == record_id) {
            Some(record) => {
                merge(record, &body["fields"]);
                ok(json!({ "record": { "record_id": record_id } }), None)
            }
            None => failure(400, 1_254_043, "RecordIdNotFound"),
        }
    }
}

impl HttpClient for FakeBitable {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self.handle(&request);
        Box::pin(async move { Ok(response) })
    }
}

fn merge(record: &mut Record, fields: &Value) {
    if let Some(fields) = fields.as_object() {
        for (name, value) in fields {
            record.fields.insert(name.clone(), value.clone());
        }
    }
}

fn ok(data: Value, token: Option<&str>) -> HttpResponse {
    let body = match token {
        Some(token) => json!({ "code": 0, "msg": "ok", "app_access_token": token, "expire": 7200 }),
        None => json!({ "code": 0, "msg": "success", "data": data }),
    };
    HttpResponse::ok_json(body.to_string())
}

fn failure(status: u16, code: i64, msg: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "code": code, "msg": msg }).to_string())
}

fn store_over(fake: Arc<FakeBitable>, page_size: u32) -> BitableStore {
    let tokens = AppTokenProvider::new(
        fake.clone(),
        BASE_URL,
        AppCredentials {
            app_id: String::from("cli_app"),
            app_secret: String::from("s3cret"),
        },
    );
    BitableStore::new(fake, tokens, BASE_URL, "bascnBase", "tblPrices").with_page_size(page_size)
}

fn price(record_id: &str, value: Value) -> RecordUpdate {
    let mut fields = Map::new();
    fields.insert(String::from("fldPrice"), value);
    RecordUpdate {
        record_id: record_id.to_owned(),
        fields,
    }
}

#[tokio::test]
async fn listing_returns_every_record_in_table_order_across_pages() {
    let fake = Arc::new(FakeBitable::with_codes(&["AAPL", "MSFT", "0700.HK", "", "TSLA"]));
    let store = store_over(fake.clone(), 2);

    let records = store.list_records().await.expect("listing succeeds");

    let ids = records.iter().map(|r| r.record_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["rec0", "rec1", "rec2", "rec3", "rec4"]);
    assert_eq!(fake.store_calls(), 3);
}

#[tokio::test]
async fn batch_update_is_visible_on_the_next_listing() {
    let fake = Arc::new(FakeBitable::with_codes(&["AAPL", "MSFT"]));
    let store = store_over(fake.clone(), 100);

    store
        .batch_update(&[price("rec0", json!(150.12345)), price("rec1", json!(410.5))])
        .await
        .expect("batch succeeds");

    let records = store.list_records().await.expect("listing succeeds");
    assert_eq!(records[0].field("fldPrice"), Some(&json!(150.12345)));
    assert_eq!(records[1].field("fldPrice"), Some(&json!(410.5)));
    assert_eq!(records[1].field("Code"), Some(&json!("MSFT")));
}

#[tokio::test]
async fn rejected_batch_applies_nothing() {
    let fake = Arc::new(FakeBitable::with_codes(&["AAPL"]));
    let store = store_over(fake.clone(), 100);

    let error = store
        .batch_update(&[price("rec0", json!(1.0)), price("recMissing", json!(2.0))])
        .await
        .expect_err("unknown record rejects the batch");

    assert_eq!(error.kind(), StoreErrorKind::Write);
    assert_eq!(error.api_code(), Some(1_254_043));
    assert_eq!(fake.field("rec0", "fldPrice"), None);
}

#[tokio::test]
async fn single_update_touches_only_its_record() {
    let fake = Arc::new(FakeBitable::with_codes(&["AAPL", "MSFT"]));
    let store = store_over(fake.clone(), 100);

    store
        .update_record(&price("rec1", json!("410.50000")))
        .await
        .expect("update succeeds");
    let error = store
        .update_record(&price("recMissing", json!(1.0)))
        .await
        .expect_err("unknown record");

    assert_eq!(error.kind(), StoreErrorKind::Write);
    assert_eq!(fake.field("rec1", "fldPrice"), Some(json!("410.50000")));
    assert_eq!(fake.field("rec0", "fldPrice"), None);
}

#[tokio::test]
async fn empty_batch_makes_no_call() {
    let fake = Arc::new(FakeBitable::with_codes(&["AAPL"]));
    let store = store_over(fake.clone(), 100);

    store.batch_update(&[]).await.expect("nothing to do");

    assert_eq!(fake.store_calls(), 0);
}
