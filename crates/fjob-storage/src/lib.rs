//! Job store contract + outbound HTTP fetch utilities.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjob_core::{JobUpdate, NewJobRecord, StoredJobRecord};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub mod postgres;

pub use postgres::PgJobStore;

pub const CRATE_NAME: &str = "fjob-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    /// A row with the same slug or source url already exists (a concurrent writer won).
    Conflict(Uuid),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("undecodable job row: {0}")]
    Decode(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Natural-key store for ingested postings. Records are deactivated, never deleted.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// A source-url match wins over a slug match.
    async fn find_by_url_or_slug(
        &self,
        source_url: &str,
        slug: &str,
    ) -> Result<Option<StoredJobRecord>, StoreError>;

    async fn insert(&self, record: &NewJobRecord) -> Result<InsertOutcome, StoreError>;

    async fn update(&self, id: Uuid, fields: &JobUpdate) -> Result<(), StoreError>;

    /// Deactivates active records whose source name contains `source_pattern`
    /// and whose last update is older than `older_than`.
    async fn bulk_deactivate_stale(
        &self,
        source_pattern: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Process-local store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: Mutex<Vec<StoredJobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StoredJobRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub async fn snapshot(&self) -> Vec<StoredJobRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_by_url_or_slug(
        &self,
        source_url: &str,
        slug: &str,
    ) -> Result<Option<StoredJobRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.job.source_url == source_url)
            .or_else(|| records.iter().find(|r| r.slug == slug))
            .cloned())
    }

    async fn insert(&self, record: &NewJobRecord) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records
            .iter()
            .find(|r| r.slug == record.slug || r.job.source_url == record.job.source_url)
        {
            return Ok(InsertOutcome::Conflict(existing.id));
        }
        records.push(record.clone().into_stored());
        Ok(InsertOutcome::Inserted(record.id))
    }

    async fn update(&self, id: Uuid, fields: &JobUpdate) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        fields.apply_to(record);
        Ok(())
    }

    async fn bulk_deactivate_stale(
        &self,
        source_pattern: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let mut deactivated = 0u64;
        for record in records.iter_mut().filter(|r| {
            r.job.is_active
                && r.updated_at < older_than
                && r.job.source_name.contains(source_pattern)
        }) {
            record.job.is_active = false;
            deactivated += 1;
        }
        Ok(deactivated)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Single-attempt HTTP client. Callers decide what a failure means.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        source_id: &str,
        url: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<FetchedResponse, FetchError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(request, url)
            .instrument(info_span!("http_fetch", source_id, url, method = "POST"))
            .await
    }

    pub async fn get(
        &self,
        source_id: &str,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<FetchedResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.send(request, url)
            .instrument(info_span!("http_fetch", source_id, url, method = "GET"))
            .await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let resp = request.send().await.map_err(|err| classify_error(err, url))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|err| classify_error(err, url))?
            .to_vec();
        Ok(FetchedResponse { status, body })
    }
}

fn classify_error(err: reqwest::Error, url: &str) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fjob_core::{NormalizedJob, RoleCategory, WorkplaceType};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 8, 0, 0).single().unwrap()
    }

    fn job(url: &str, source_name: &str) -> NormalizedJob {
        NormalizedJob {
            title: "Interim CFO".into(),
            company_name: "Northwind".into(),
            company_logo_url: None,
            location: "Leeds".into(),
            is_remote: false,
            workplace_type: WorkplaceType::OnSite,
            compensation: None,
            role_category: RoleCategory::Finance,
            posted_date: ts(1),
            valid_through: None,
            source_url: url.into(),
            source_name: source_name.into(),
            description_snippet: None,
            is_active: true,
            is_fractional: true,
        }
    }

    fn stored(slug: &str, url: &str, source_name: &str, updated_day: u32) -> StoredJobRecord {
        let mut record = NewJobRecord::new(slug.into(), job(url, source_name), ts(1)).into_stored();
        record.updated_at = ts(updated_day);
        record
    }

    #[tokio::test]
    async fn memory_store_prefers_url_match_over_slug_match() {
        let by_slug = stored("interim-cfo-northwind-aaaa", "https://a.example/1", "LinkedIn (Apify)", 2);
        let by_url = stored("interim-cfo-northwind-bbbb", "https://a.example/2", "LinkedIn (Apify)", 2);
        let store = MemoryJobStore::with_records(vec![by_slug.clone(), by_url.clone()]);

        let found = store
            .find_by_url_or_slug("https://a.example/2", "interim-cfo-northwind-aaaa")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_url.id);

        let found = store
            .find_by_url_or_slug("https://a.example/404", "interim-cfo-northwind-aaaa")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_slug.id);

        assert!(store
            .find_by_url_or_slug("https://a.example/404", "nope")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn memory_store_reports_conflicts_instead_of_duplicating() {
        let store = MemoryJobStore::new();
        let first = NewJobRecord::new("slug-aaaa".into(), job("https://a.example/1", "LinkedIn (Apify)"), ts(1));
        assert_eq!(store.insert(&first).await.unwrap(), InsertOutcome::Inserted(first.id));

        let same_slug = NewJobRecord::new("slug-aaaa".into(), job("https://a.example/2", "LinkedIn (Apify)"), ts(1));
        assert_eq!(store.insert(&same_slug).await.unwrap(), InsertOutcome::Conflict(first.id));

        let same_url = NewJobRecord::new("slug-bbbb".into(), job("https://a.example/1", "LinkedIn (Apify)"), ts(1));
        assert_eq!(store.insert(&same_url).await.unwrap(), InsertOutcome::Conflict(first.id));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_update_of_unknown_id_is_not_found() {
        let store = MemoryJobStore::new();
        let id = Uuid::new_v4();
        let err = store
            .update(id, &JobUpdate::from_sighting(&job("https://a.example/1", "x"), ts(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn memory_store_deactivates_only_matching_stale_records() {
        let stale = stored("a", "https://a.example/1", "LinkedIn (Apify)", 1);
        let fresh = stored("b", "https://a.example/2", "LinkedIn (Apify)", 20);
        let other_family = stored("c", "https://a.example/3", "Manual", 1);
        let store = MemoryJobStore::with_records(vec![stale, fresh, other_family]);

        let count = store.bulk_deactivate_stale("Apify", ts(10)).await.unwrap();
        assert_eq!(count, 1);

        let snapshot = store.snapshot().await;
        let active: Vec<_> = snapshot.iter().map(|r| (r.slug.as_str(), r.job.is_active)).collect();
        assert_eq!(active, vec![("a", false), ("b", true), ("c", true)]);

        // Already inactive rows are not counted twice.
        assert_eq!(store.bulk_deactivate_stale("Apify", ts(10)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memory_store_pattern_is_literal() {
        let store = MemoryJobStore::with_records(vec![
            stored("a", "https://a.example/1", "LinkedIn (Apify)", 1),
            stored("b", "https://a.example/2", "100%_Jobs", 1),
        ]);

        assert_eq!(store.bulk_deactivate_stale("Ap_fy", ts(10)).await.unwrap(), 0);
        assert_eq!(store.bulk_deactivate_stale("%", ts(10)).await.unwrap(), 1);

        let snapshot = store.snapshot().await;
        assert!(snapshot[0].job.is_active);
        assert!(!snapshot[1].job.is_active);
    }

    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/items")
    }

    #[tokio::test]
    async fn fetcher_returns_body_on_success() {
        let url = serve_once("HTTP/1.1 200 OK", "[]").await;
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let resp = http.post_json("linkedin", &url, Some("token"), &serde_json::json!({})).await;
        let resp = resp.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, b"[]");
    }

    #[tokio::test]
    async fn fetcher_maps_non_success_status_to_error() {
        let url = serve_once("HTTP/1.1 429 Too Many Requests", "{}").await;
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let err = http.get("career-site", &url, None).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 429, .. }));
    }
}
