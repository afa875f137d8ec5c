//! Maps a parsed [`ProviderJob`] onto the canonical [`NormalizedJob`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use fjob_core::{
    classify_role, format_compensation, is_fractional_role, NormalizedJob, SkipReason,
    WorkplaceType,
};

use crate::{parse_record, ProviderJob, RawProviderRecord};

pub const DEFAULT_LOCATION: &str = "UK";
pub const SNIPPET_MAX_CHARS: usize = 200;
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;
/// Provider dates outside this year range are treated as unparseable.
pub const MIN_ACCEPTED_YEAR: i32 = 1970;
pub const MAX_ACCEPTED_YEAR: i32 = 9999;

pub fn normalize_raw(
    raw: &RawProviderRecord,
    fetched_at: DateTime<Utc>,
) -> Result<NormalizedJob, SkipReason> {
    parse_record(raw).and_then(|job| normalize(job, fetched_at))
}

pub fn normalize(job: ProviderJob, fetched_at: DateTime<Utc>) -> Result<NormalizedJob, SkipReason> {
    let title = required(job.title, SkipReason::MissingTitle)?;
    let company_name = required(job.company, SkipReason::MissingCompany)?;
    let source_url = required(job.source_url, SkipReason::MissingSourceUrl)?;

    let role_category = classify_role(&title);
    let workplace_type = infer_workplace_type(job.remote, job.work_arrangement.as_deref(), &title);
    let posted_date = job
        .date_posted
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| job.date_created.as_deref().and_then(parse_timestamp))
        .unwrap_or(fetched_at);
    let valid_through = job
        .valid_through
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| posted_date.checked_add_signed(Duration::days(DEFAULT_VALIDITY_DAYS)))
        .ok_or_else(|| SkipReason::Malformed("posted date out of range".to_string()))?;

    Ok(NormalizedJob {
        is_fractional: is_fractional_role(&title),
        compensation: Some(format_compensation(&job.salary, role_category)),
        description_snippet: extract_snippet(job.description.as_deref(), job.summary.as_deref()),
        location: job
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        is_remote: workplace_type.is_remote(),
        workplace_type,
        role_category,
        title,
        company_name,
        company_logo_url: job.company_logo_url,
        posted_date,
        valid_through: Some(valid_through),
        source_url,
        source_name: job.source_name,
        is_active: true,
    })
}

fn required(value: Option<String>, reason: SkipReason) -> Result<String, SkipReason> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(reason),
    }
}

pub fn infer_workplace_type(
    remote: Option<bool>,
    work_arrangement: Option<&str>,
    title: &str,
) -> WorkplaceType {
    let mentions_hybrid = |s: &str| s.to_lowercase().contains("hybrid");
    if remote == Some(true) {
        WorkplaceType::Remote
    } else if work_arrangement.is_some_and(mentions_hybrid) || mentions_hybrid(title) {
        WorkplaceType::Hybrid
    } else {
        WorkplaceType::OnSite
    }
}

/// Description cut at a word boundary, else the summary, else nothing.
pub fn extract_snippet(description: Option<&str>, summary: Option<&str>) -> Option<String> {
    let collapsed = description
        .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|d| !d.is_empty());

    match collapsed {
        Some(text) if text.chars().count() <= SNIPPET_MAX_CHARS => Some(text),
        Some(text) => {
            let head: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
            let cut = match head.rfind(' ') {
                Some(idx) if idx > 0 => &head[..idx],
                _ => head.as_str(),
            };
            Some(format!("{}...", cut.trim_end()))
        }
        None => summary
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty()),
    }
}

/// Accepts RFC 3339, naive ISO datetimes (taken as UTC) and bare dates,
/// within [`MIN_ACCEPTED_YEAR`]..=[`MAX_ACCEPTED_YEAR`].
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    parse_any_timestamp(text.trim())
        .filter(|dt| (MIN_ACCEPTED_YEAR..=MAX_ACCEPTED_YEAR).contains(&dt.year()))
}

fn parse_any_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
