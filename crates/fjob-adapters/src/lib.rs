//! Provider contracts, the Apify-backed provider client, and per-provider parsers.

use async_trait::async_trait;
use fjob_core::{SalarySignal, SkipReason};
use fjob_storage::HttpFetcher;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

pub mod career_site;
pub mod linkedin;
pub mod normalize;

pub use normalize::{normalize, normalize_raw};

pub const CRATE_NAME: &str = "fjob-adapters";

/// Marker every source name produced by the Apify providers carries.
pub const SOURCE_FAMILY: &str = "Apify";

pub const DEFAULT_APIFY_BASE_URL: &str = "https://api.apify.com/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "career-site")]
    CareerSite,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::LinkedIn => "linkedin",
            ProviderKind::CareerSite => "career-site",
        }
    }

    pub fn actor_id(&self) -> &'static str {
        match self {
            ProviderKind::LinkedIn => "fantastic-jobs/advanced-linkedin-job-search-api",
            ProviderKind::CareerSite => "fantastic-jobs/career-site-job-listing-api",
        }
    }

    /// Lookback window the provider accepts.
    pub fn time_range(&self) -> &'static str {
        match self {
            ProviderKind::LinkedIn => "7d",
            ProviderKind::CareerSite => "6m",
        }
    }

    /// Smallest page size the provider accepts.
    pub fn min_results(&self) -> u32 {
        10
    }

    pub fn padded_limit(&self, hint: u32) -> u32 {
        hint.max(self.min_results())
    }

    /// Maps a webhook actor reference (`user/name`, `user~name` or a bare name) to a provider.
    pub fn from_actor_ref(actor: &str) -> Option<Self> {
        let actor = actor.to_ascii_lowercase().replace('~', "/");
        [ProviderKind::LinkedIn, ProviderKind::CareerSite]
            .into_iter()
            .find(|p| actor == p.actor_id() || p.actor_id().ends_with(&format!("/{actor}")))
            .or_else(|| {
                if actor.contains("linkedin") {
                    Some(ProviderKind::LinkedIn)
                } else if actor.contains("career-site") {
                    Some(ProviderKind::CareerSite)
                } else {
                    None
                }
            })
    }
}

/// One title/location query against one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub title_search: Vec<String>,
    pub location_search: Vec<String>,
    pub result_limit: u32,
}

/// Wire body for the provider's "run and wait for dataset" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    pub title_search: Vec<String>,
    pub location_search: Vec<String>,
    pub time_range: &'static str,
    pub limit: u32,
    pub include_ai: bool,
}

impl ProviderRequest {
    pub fn new(provider: ProviderKind, query: &ProviderQuery) -> Self {
        Self {
            title_search: query.title_search.clone(),
            location_search: query.location_search.clone(),
            time_range: provider.time_range(),
            limit: provider.padded_limit(query.result_limit),
            include_ai: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("provider document is not a JSON object")]
    NotAnObject,
    #[error("provider response is not a JSON array")]
    NotAnArray,
    #[error("undecodable provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Provider-shaped document, only known to be a JSON object until parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProviderRecord {
    provider: ProviderKind,
    document: JsonValue,
}

impl RawProviderRecord {
    pub fn new(provider: ProviderKind, document: JsonValue) -> Result<Self, AdapterError> {
        if !document.is_object() {
            return Err(AdapterError::NotAnObject);
        }
        Ok(Self { provider, document })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn document(&self) -> &JsonValue {
        &self.document
    }
}

/// Shared intermediate every provider parser produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderJob {
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_logo_url: Option<String>,
    pub source_url: Option<String>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub work_arrangement: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub salary: SalarySignal,
    pub date_posted: Option<String>,
    pub date_created: Option<String>,
    pub valid_through: Option<String>,
    pub source_name: String,
}

pub fn parse_record(raw: &RawProviderRecord) -> Result<ProviderJob, SkipReason> {
    match raw.provider() {
        ProviderKind::LinkedIn => linkedin::parse(raw.document()),
        ProviderKind::CareerSite => career_site::parse(raw.document()),
    }
}

/// Decodes a dataset-items body. Non-object items are dropped.
pub fn decode_records(provider: ProviderKind, body: &[u8]) -> Result<Vec<RawProviderRecord>, AdapterError> {
    let value: JsonValue = serde_json::from_slice(body)?;
    let JsonValue::Array(items) = value else {
        return Err(AdapterError::NotAnArray);
    };
    let total = items.len();
    let records = items
        .into_iter()
        .filter_map(|item| RawProviderRecord::new(provider, item).ok())
        .collect::<Vec<_>>();
    if records.len() < total {
        warn!(
            provider = provider.id(),
            dropped = total - records.len(),
            "dropped non-object dataset items"
        );
    }
    Ok(records)
}

/// Best-effort provider access: every failure mode yields an empty list.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn fetch(&self, provider: ProviderKind, query: &ProviderQuery) -> Vec<RawProviderRecord>;

    /// Reads the items of a provider run that already finished.
    async fn fetch_dataset(
        &self,
        provider: ProviderKind,
        dataset_id: &str,
        limit: u32,
    ) -> Vec<RawProviderRecord>;
}

#[derive(Debug, Clone)]
pub struct ApifyClient {
    http: HttpFetcher,
    token: Option<String>,
    base_url: String,
}

impl ApifyClient {
    pub fn new(http: HttpFetcher, token: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn run_sync_url(&self, provider: ProviderKind) -> String {
        format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.base_url,
            provider.actor_id().replace('/', "~")
        )
    }

    fn dataset_items_url(&self, dataset_id: &str, limit: u32) -> String {
        format!(
            "{}/datasets/{}/items?format=json&clean=true&limit={}&offset=0",
            self.base_url, dataset_id, limit
        )
    }

    fn token(&self, provider: ProviderKind) -> Option<&str> {
        if self.token.is_none() {
            warn!(provider = provider.id(), "APIFY_API_TOKEN not set; skipping provider fetch");
        }
        self.token.as_deref()
    }
}

#[async_trait]
impl ProviderClient for ApifyClient {
    async fn fetch(&self, provider: ProviderKind, query: &ProviderQuery) -> Vec<RawProviderRecord> {
        let Some(token) = self.token(provider) else {
            return Vec::new();
        };
        let request = ProviderRequest::new(provider, query);
        let url = self.run_sync_url(provider);

        let resp = match self.http.post_json(provider.id(), &url, Some(token), &request).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(provider = provider.id(), terms = ?query.title_search, error = %err, "provider fetch failed");
                return Vec::new();
            }
        };
        match decode_records(provider, &resp.body) {
            Ok(records) => {
                info!(provider = provider.id(), terms = ?query.title_search, count = records.len(), "provider fetch complete");
                records
            }
            Err(err) => {
                warn!(provider = provider.id(), error = %err, "provider returned an unusable body");
                Vec::new()
            }
        }
    }

    async fn fetch_dataset(
        &self,
        provider: ProviderKind,
        dataset_id: &str,
        limit: u32,
    ) -> Vec<RawProviderRecord> {
        let Some(token) = self.token(provider) else {
            return Vec::new();
        };
        let url = self.dataset_items_url(dataset_id, limit);
        match self.http.get(provider.id(), &url, Some(token)).await {
            Ok(resp) => decode_records(provider, &resp.body).unwrap_or_else(|err| {
                warn!(provider = provider.id(), dataset_id, error = %err, "dataset body unusable");
                Vec::new()
            }),
            Err(err) => {
                warn!(provider = provider.id(), dataset_id, error = %err, "dataset fetch failed");
                Vec::new()
            }
        }
    }
}

pub(crate) fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn first_text(values: Option<Vec<String>>) -> Option<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .find_map(|v| text(Some(v)))
}

/// `salary_raw` arrives either as display text or as a schema.org MonetaryAmount.
pub(crate) fn salary_raw_text(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => text(Some(s.clone())),
        JsonValue::Object(obj) => {
            let currency = obj.get("currency").and_then(JsonValue::as_str).unwrap_or("");
            let amount = obj.get("value")?;
            let unit = amount
                .get("unitText")
                .and_then(JsonValue::as_str)
                .map(|u| format!("/{}", u.to_ascii_lowercase()))
                .unwrap_or_default();
            let number = |key: &str| amount.get(key).and_then(JsonValue::as_f64);
            let figure = match (number("minValue"), number("maxValue"), number("value")) {
                (Some(min), Some(max), _) if min != max => format!("{min}-{max}"),
                (Some(v), _, _) | (None, Some(v), _) | (None, None, Some(v)) => format!("{v}"),
                _ => return None,
            };
            Some(format!("{currency} {figure}{unit}").trim().to_string())
        }
        _ => None,
    }
}
