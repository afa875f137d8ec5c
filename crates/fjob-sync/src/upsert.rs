//! Natural-key deduplication: source url first, generated slug second.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fjob_core::{JobUpdate, NewJobRecord, NormalizedJob, SkipReason};
use fjob_storage::{InsertOutcome, JobStore, StoreError};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SLUG_BASE_MAX_CHARS: usize = 80;
pub const SLUG_SUFFIX_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted(Uuid),
    Updated(Uuid),
}

type SuffixGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn JobStore>,
    suffix: SuffixGenerator,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            suffix: Arc::new(random_suffix),
        }
    }

    pub fn with_suffix_generator(mut self, suffix: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.suffix = Arc::new(suffix);
        self
    }

    /// Storage failures come back as [`SkipReason::Storage`].
    pub async fn upsert(
        &self,
        job: &NormalizedJob,
        now: DateTime<Utc>,
    ) -> Result<UpsertAction, SkipReason> {
        let slug = generate_slug(&job.title, &job.company_name, &(self.suffix)());

        if let Some(existing) = self
            .store
            .find_by_url_or_slug(&job.source_url, &slug)
            .await
            .map_err(storage_skip)?
        {
            self.refresh(existing.id, job, now).await?;
            return Ok(UpsertAction::Updated(existing.id));
        }

        let record = NewJobRecord::new(slug, job.clone(), now);
        match self.store.insert(&record).await.map_err(storage_skip)? {
            InsertOutcome::Inserted(id) => {
                debug!(%id, slug = %record.slug, "inserted job");
                Ok(UpsertAction::Inserted(id))
            }
            InsertOutcome::Conflict(id) => {
                warn!(%id, slug = %record.slug, url = %job.source_url, "insert conflicted; updating existing job");
                self.refresh(id, job, now).await?;
                Ok(UpsertAction::Updated(id))
            }
        }
    }

    async fn refresh(&self, id: Uuid, job: &NormalizedJob, now: DateTime<Utc>) -> Result<(), SkipReason> {
        self.store
            .update(id, &JobUpdate::from_sighting(job, now))
            .await
            .map_err(storage_skip)
    }
}

fn storage_skip(err: StoreError) -> SkipReason {
    SkipReason::Storage(err.to_string())
}

/// `lowercase(title + " " + company)` reduced to `[a-z0-9-]` and capped at 80 characters.
pub fn slug_base(title: &str, company: &str) -> String {
    let lowered = format!("{title} {company}").to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(SLUG_BASE_MAX_CHARS);
    slug.trim_end_matches('-').to_string()
}

pub fn generate_slug(title: &str, company: &str, suffix: &str) -> String {
    let base = slug_base(title, company);
    if base.is_empty() {
        format!("job-{suffix}")
    } else {
        format!("{base}-{suffix}")
    }
}

pub fn random_suffix() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SLUG_SUFFIX_CHARS)
        .collect()
}
