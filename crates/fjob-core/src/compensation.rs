//! Compensation display strings, normalized toward a day rate.

use serde::{Deserialize, Serialize};

use crate::RoleCategory;

pub const WORKING_DAYS_PER_YEAR: f64 = 220.0;

/// Structured and free-text salary hints a provider may attach to a posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalarySignal {
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub unit: Option<String>,
    pub raw: Option<String>,
}

/// Estimated GBP day-rate band for a role category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRateRange {
    pub min: u32,
    pub max: u32,
}

impl DayRateRange {
    pub fn display(&self) -> String {
        format!("£{}-£{}/day", self.min, self.max)
    }
}

pub fn default_day_rate(category: RoleCategory) -> DayRateRange {
    let (min, max) = match category {
        RoleCategory::Executive => (1000, 2000),
        RoleCategory::Finance => (900, 1500),
        RoleCategory::Engineering => (850, 1600),
        RoleCategory::Marketing => (800, 1400),
        RoleCategory::Operations => (850, 1400),
        RoleCategory::Hr => (700, 1200),
        RoleCategory::Product => (800, 1300),
        RoleCategory::Sales => (750, 1300),
        RoleCategory::Security => (900, 1500),
    };
    DayRateRange { min, max }
}

/// Structured day/year value first, then the raw provider string, then the category band.
pub fn format_compensation(signal: &SalarySignal, category: RoleCategory) -> String {
    structured_compensation(signal)
        .or_else(|| non_blank(signal.raw.as_deref()))
        .unwrap_or_else(|| default_day_rate(category).display())
}

fn structured_compensation(signal: &SalarySignal) -> Option<String> {
    let value = signal.value.filter(|v| v.is_finite() && *v > 0.0)?;
    let symbol = currency_symbol(signal.currency.as_deref());
    let unit = signal.unit.as_deref()?.trim().to_ascii_lowercase();

    match unit.as_str() {
        "day" => Some(format!("{symbol}{}/day", whole(value))),
        "year" => {
            let day_rate = (value / WORKING_DAYS_PER_YEAR).round();
            let thousands = (value / 1000.0).round();
            Some(format!(
                "~{symbol}{}/day ({symbol}{}k/yr)",
                whole(day_rate),
                whole(thousands)
            ))
        }
        _ => None,
    }
}

/// `£` for GBP or a missing code; any other currency prints its ISO code.
pub fn currency_symbol(code: Option<&str>) -> String {
    match code.map(str::trim) {
        None | Some("") => "£".to_string(),
        Some(c) if c.eq_ignore_ascii_case("GBP") => "£".to_string(),
        Some(c) => c.to_ascii_uppercase(),
    }
}

fn whole(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(value: f64, currency: &str, unit: &str) -> SalarySignal {
        SalarySignal {
            value: Some(value),
            currency: Some(currency.into()),
            unit: Some(unit.into()),
            raw: None,
        }
    }

    #[test]
    fn day_rate_is_formatted_directly() {
        let text = format_compensation(&signal(1000.0, "GBP", "day"), RoleCategory::Finance);
        assert_eq!(text, "£1000/day");
    }

    #[test]
    fn annual_salary_converts_to_estimated_day_rate() {
        let text = format_compensation(&signal(220000.0, "GBP", "YEAR"), RoleCategory::Finance);
        assert_eq!(text, "~£1000/day (£220k/yr)");
    }

    #[test]
    fn other_currencies_and_units() {
        assert_eq!(
            format_compensation(&signal(900.0, "usd", "day"), RoleCategory::Sales),
            "USD900/day"
        );
        assert_eq!(
            format_compensation(&signal(260000.0, "EUR", "year"), RoleCategory::Sales),
            "~EUR1182/day (EUR260k/yr)"
        );
        assert_eq!(
            format_compensation(&signal(1200.5, "CHF", "day"), RoleCategory::Sales),
            "CHF1200.50/day"
        );

        let mut hourly = signal(150.0, "GBP", "hour");
        hourly.raw = Some("£150 per hour".into());
        assert_eq!(format_compensation(&hourly, RoleCategory::Sales), "£150 per hour");
    }

    #[test]
    fn missing_salary_falls_back_to_category_band() {
        let none = SalarySignal::default();
        assert_eq!(format_compensation(&none, RoleCategory::Finance), "£900-£1500/day");
        assert_eq!(format_compensation(&none, RoleCategory::Hr), "£700-£1200/day");

        let blank_raw = SalarySignal {
            raw: Some("   ".into()),
            ..SalarySignal::default()
        };
        assert_eq!(
            format_compensation(&blank_raw, RoleCategory::Executive),
            "£1000-£2000/day"
        );
    }

    #[test]
    fn every_category_has_a_sane_band() {
        for category in RoleCategory::ALL {
            let band = default_day_rate(category);
            assert!(band.min < band.max, "{category} band inverted");
        }
    }
}
