//! Canonical job model shared by the ingestion crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod compensation;
pub mod taxonomy;

pub use compensation::{default_day_rate, format_compensation, DayRateRange, SalarySignal};
pub use taxonomy::{classify_role, is_fractional_role};

pub const CRATE_NAME: &str = "fjob-core";

/// Role taxonomy every posting is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleCategory {
    Executive,
    Finance,
    Engineering,
    Marketing,
    Operations,
    #[serde(rename = "HR")]
    Hr,
    Product,
    Sales,
    Security,
}

impl RoleCategory {
    pub const ALL: [RoleCategory; 9] = [
        RoleCategory::Executive,
        RoleCategory::Finance,
        RoleCategory::Engineering,
        RoleCategory::Marketing,
        RoleCategory::Operations,
        RoleCategory::Hr,
        RoleCategory::Product,
        RoleCategory::Sales,
        RoleCategory::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCategory::Executive => "Executive",
            RoleCategory::Finance => "Finance",
            RoleCategory::Engineering => "Engineering",
            RoleCategory::Marketing => "Marketing",
            RoleCategory::Operations => "Operations",
            RoleCategory::Hr => "HR",
            RoleCategory::Product => "Product",
            RoleCategory::Sales => "Sales",
            RoleCategory::Security => "Security",
        }
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "role category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkplaceType {
    Remote,
    Hybrid,
    #[serde(rename = "On-site")]
    OnSite,
}

impl WorkplaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkplaceType::Remote => "Remote",
            WorkplaceType::Hybrid => "Hybrid",
            WorkplaceType::OnSite => "On-site",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, WorkplaceType::Remote)
    }
}

impl fmt::Display for WorkplaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkplaceType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(WorkplaceType::Remote),
            "hybrid" => Ok(WorkplaceType::Hybrid),
            "on-site" | "onsite" | "on site" => Ok(WorkplaceType::OnSite),
            _ => Err(UnknownVariant {
                kind: "workplace type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Canonical posting produced by the normalizer, independent of provider schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedJob {
    pub title: String,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub location: String,
    pub is_remote: bool,
    pub workplace_type: WorkplaceType,
    pub compensation: Option<String>,
    pub role_category: RoleCategory,
    pub posted_date: DateTime<Utc>,
    pub valid_through: Option<DateTime<Utc>>,
    pub source_url: String,
    pub source_name: String,
    pub description_snippet: Option<String>,
    pub is_active: bool,
    pub is_fractional: bool,
}

/// Persisted posting. `id`, `slug` and `job.source_url` are identity and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredJobRecord {
    pub id: Uuid,
    pub slug: String,
    #[serde(flatten)]
    pub job: NormalizedJob,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload handed to a job store on first sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobRecord {
    pub id: Uuid,
    pub slug: String,
    pub job: NormalizedJob,
    pub created_at: DateTime<Utc>,
}

impl NewJobRecord {
    pub fn new(slug: String, job: NormalizedJob, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug,
            job: NormalizedJob { is_active: true, ..job },
            created_at: now,
        }
    }

    pub fn into_stored(self) -> StoredJobRecord {
        StoredJobRecord {
            id: self.id,
            slug: self.slug,
            job: self.job,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Mutable display fields rewritten when a known posting is seen again.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub title: String,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub location: String,
    pub is_remote: bool,
    pub workplace_type: WorkplaceType,
    pub compensation: Option<String>,
    pub role_category: RoleCategory,
    pub posted_date: DateTime<Utc>,
    pub valid_through: Option<DateTime<Utc>>,
    pub source_name: String,
    pub description_snippet: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl JobUpdate {
    /// A sighting always reactivates the posting.
    pub fn from_sighting(job: &NormalizedJob, now: DateTime<Utc>) -> Self {
        Self {
            title: job.title.clone(),
            company_name: job.company_name.clone(),
            company_logo_url: job.company_logo_url.clone(),
            location: job.location.clone(),
            is_remote: job.is_remote,
            workplace_type: job.workplace_type,
            compensation: job.compensation.clone(),
            role_category: job.role_category,
            posted_date: job.posted_date,
            valid_through: job.valid_through,
            source_name: job.source_name.clone(),
            description_snippet: job.description_snippet.clone(),
            is_active: true,
            updated_at: now,
        }
    }

    pub fn apply_to(&self, record: &mut StoredJobRecord) {
        let job = &mut record.job;
        job.title = self.title.clone();
        job.company_name = self.company_name.clone();
        job.company_logo_url = self.company_logo_url.clone();
        job.location = self.location.clone();
        job.is_remote = self.is_remote;
        job.workplace_type = self.workplace_type;
        job.compensation = self.compensation.clone();
        job.role_category = self.role_category;
        job.posted_date = self.posted_date;
        job.valid_through = self.valid_through;
        job.source_name = self.source_name.clone();
        job.description_snippet = self.description_snippet.clone();
        job.is_active = self.is_active;
        record.updated_at = self.updated_at;
    }
}

/// Why a single record did not make it into the store. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("record has no title")]
    MissingTitle,
    #[error("record has no company name")]
    MissingCompany,
    #[error("record has no source url")]
    MissingSourceUrl,
    #[error("record is not a usable provider document: {0}")]
    Malformed(String),
    #[error("storage failure: {0}")]
    Storage(String),
}
