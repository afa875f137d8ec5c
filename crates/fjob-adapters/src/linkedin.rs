//! LinkedIn job search dataset items.

use fjob_core::{SalarySignal, SkipReason};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::{first_text, salary_raw_text, text, ProviderJob, SOURCE_FAMILY};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinkedInItem {
    title: Option<String>,
    organization: Option<String>,
    organization_logo: Option<String>,
    url: Option<String>,
    date_posted: Option<String>,
    date_created: Option<String>,
    date_validthrough: Option<String>,
    salary_raw: Option<JsonValue>,
    locations_derived: Option<Vec<String>>,
    cities_derived: Option<Vec<String>>,
    remote_derived: Option<bool>,
    description_text: Option<String>,
    ai_salary_value: Option<f64>,
    ai_salary_currency: Option<String>,
    ai_salary_unittext: Option<String>,
    ai_work_arrangement: Option<String>,
    ai_core_responsibilities: Option<String>,
}

pub fn source_name() -> String {
    format!("LinkedIn ({SOURCE_FAMILY})")
}

pub fn parse(document: &JsonValue) -> Result<ProviderJob, SkipReason> {
    let item = LinkedInItem::deserialize(document)
        .map_err(|err| SkipReason::Malformed(format!("linkedin item: {err}")))?;

    Ok(ProviderJob {
        title: text(item.title),
        company: text(item.organization),
        company_logo_url: text(item.organization_logo),
        source_url: text(item.url),
        location: first_text(item.locations_derived).or_else(|| first_text(item.cities_derived)),
        remote: item.remote_derived,
        work_arrangement: text(item.ai_work_arrangement),
        description: text(item.description_text),
        summary: text(item.ai_core_responsibilities),
        salary: SalarySignal {
            value: item.ai_salary_value,
            currency: text(item.ai_salary_currency),
            unit: text(item.ai_salary_unittext),
            raw: salary_raw_text(item.salary_raw.as_ref()),
        },
        date_posted: text(item.date_posted),
        date_created: text(item.date_created),
        valid_through: text(item.date_validthrough),
        source_name: source_name(),
    })
}
