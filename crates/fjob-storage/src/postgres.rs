//! Postgres-backed [`JobStore`] over the `jobs` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjob_core::{JobUpdate, NewJobRecord, NormalizedJob, StoredJobRecord};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::{InsertOutcome, JobStore, StoreError};

/// Literal substring match on `source_name`, same as [`MemoryJobStore`](crate::MemoryJobStore).
const DEACTIVATE_STALE_SQL: &str = r#"
    UPDATE jobs
       SET is_active = FALSE
     WHERE strpos(source_name, $1) > 0
       AND updated_at < $2
       AND is_active = TRUE
"#;

const JOB_COLUMNS: &str = r#"
    id, slug, title, company_name, company_logo, location, is_remote,
    workplace_type, compensation, role_category, posted_date, valid_through,
    source_url, source_name, description_snippet, is_active, is_fractional,
    created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<StoredJobRecord, StoreError> {
    let workplace_type: String = row.try_get("workplace_type")?;
    let role_category: String = row.try_get("role_category")?;
    Ok(StoredJobRecord {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        job: NormalizedJob {
            title: row.try_get("title")?,
            company_name: row.try_get("company_name")?,
            company_logo_url: row.try_get("company_logo")?,
            location: row.try_get("location")?,
            is_remote: row.try_get("is_remote")?,
            workplace_type: workplace_type
                .parse()
                .map_err(|e| StoreError::Decode(format!("{e}")))?,
            compensation: row.try_get("compensation")?,
            role_category: role_category
                .parse()
                .map_err(|e| StoreError::Decode(format!("{e}")))?,
            posted_date: row.try_get("posted_date")?,
            valid_through: row.try_get("valid_through")?,
            source_url: row.try_get("source_url")?,
            source_name: row.try_get("source_name")?,
            description_snippet: row.try_get("description_snippet")?,
            is_active: row.try_get("is_active")?,
            is_fractional: row.try_get("is_fractional")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_by_url_or_slug(
        &self,
        source_url: &str,
        slug: &str,
    ) -> Result<Option<StoredJobRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS}
              FROM jobs
             WHERE source_url = $1 OR slug = $2
             ORDER BY (source_url = $1) DESC
             LIMIT 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(source_url)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, record: &NewJobRecord) -> Result<InsertOutcome, StoreError> {
        let job = &record.job;
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (
                id, slug, title, company_name, company_logo, location,
                is_remote, workplace_type, compensation, role_category,
                posted_date, valid_through, source_url, source_name,
                description_snippet, is_active, is_fractional,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, TRUE, $16, $17, $17
            )
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.slug)
        .bind(&job.title)
        .bind(&job.company_name)
        .bind(&job.company_logo_url)
        .bind(&job.location)
        .bind(job.is_remote)
        .bind(job.workplace_type.as_str())
        .bind(&job.compensation)
        .bind(job.role_category.as_str())
        .bind(job.posted_date)
        .bind(job.valid_through)
        .bind(&job.source_url)
        .bind(&job.source_name)
        .bind(&job.description_snippet)
        .bind(job.is_fractional)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(InsertOutcome::Inserted(id));
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
              FROM jobs
             WHERE slug = $1 OR source_url = $2
             ORDER BY (slug = $1) DESC
             LIMIT 1
            "#,
        )
        .bind(&record.slug)
        .bind(&job.source_url)
        .fetch_optional(&self.pool)
        .await?;

        existing.map(InsertOutcome::Conflict).ok_or_else(|| {
            StoreError::Unavailable(format!(
                "insert of {} conflicted but no conflicting row was found",
                record.slug
            ))
        })
    }

    async fn update(&self, id: Uuid, fields: &JobUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                title = $2,
                company_name = $3,
                company_logo = $4,
                location = $5,
                is_remote = $6,
                workplace_type = $7,
                compensation = $8,
                role_category = $9,
                posted_date = $10,
                valid_through = $11,
                source_name = $12,
                description_snippet = $13,
                is_active = $14,
                updated_at = $15
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.company_name)
        .bind(&fields.company_logo_url)
        .bind(&fields.location)
        .bind(fields.is_remote)
        .bind(fields.workplace_type.as_str())
        .bind(&fields.compensation)
        .bind(fields.role_category.as_str())
        .bind(fields.posted_date)
        .bind(fields.valid_through)
        .bind(&fields.source_name)
        .bind(&fields.description_snippet)
        .bind(fields.is_active)
        .bind(fields.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn bulk_deactivate_stale(
        &self,
        source_pattern: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(DEACTIVATE_STALE_SQL)
        .bind(source_pattern)
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_pattern_is_not_a_like_wildcard() {
        assert!(DEACTIVATE_STALE_SQL.contains("strpos(source_name, $1) > 0"));
        assert!(!DEACTIVATE_STALE_SQL.contains("LIKE"));
    }
}
