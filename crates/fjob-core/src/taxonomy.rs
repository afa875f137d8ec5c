//! Title heuristics: role classification and the fractional-role filter.

use crate::RoleCategory;

#[derive(Debug, Clone, Copy)]
pub struct RoleRule {
    pub category: RoleCategory,
    /// Substrings of the lowercased title; any one is enough.
    pub keywords: &'static [&'static str],
}

impl RoleRule {
    pub fn matches(&self, title: &str) -> bool {
        self.matches_lowered(&title.to_lowercase())
    }

    fn matches_lowered(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Evaluated top to bottom; the first matching rule wins.
pub const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        category: RoleCategory::Executive,
        keywords: &["ceo", "chief executive", "managing director"],
    },
    RoleRule {
        category: RoleCategory::Finance,
        keywords: &[
            "cfo",
            "chief financial",
            "finance director",
            "accountant",
        ],
    },
    RoleRule {
        category: RoleCategory::Engineering,
        keywords: &[
            "cto",
            "chief technology",
            "tech director",
            "engineering",
        ],
    },
    RoleRule {
        category: RoleCategory::Marketing,
        keywords: &[
            "cmo",
            "chief marketing",
            "marketing director",
            "growth",
        ],
    },
    RoleRule {
        category: RoleCategory::Operations,
        keywords: &["coo", "chief operating", "operations director"],
    },
    RoleRule {
        category: RoleCategory::Hr,
        keywords: &[
            "chro",
            "chief people",
            "hr director",
            "people",
        ],
    },
    RoleRule {
        category: RoleCategory::Product,
        keywords: &[
            "cpo",
            "chief product",
            "product director",
            "head of product",
        ],
    },
    RoleRule {
        category: RoleCategory::Sales,
        keywords: &[
            "cro",
            "chief revenue",
            "sales director",
            "sales manager",
        ],
    },
    RoleRule {
        category: RoleCategory::Security,
        keywords: &["ciso", "security", "information security"],
    },
    RoleRule {
        category: RoleCategory::Operations,
        keywords: &["quality"],
    },
];

pub const FALLBACK_CATEGORY: RoleCategory = RoleCategory::Executive;

pub fn classify_role(title: &str) -> RoleCategory {
    classify_with(ROLE_RULES, title)
}

pub fn classify_with(rules: &[RoleRule], title: &str) -> RoleCategory {
    let lowered = title.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches_lowered(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(FALLBACK_CATEGORY)
}

const FRACTIONAL_MARKERS: &[&str] = &["fractional", "interim", "part-time", "part time", "portfolio"];
const CONTRACT_SENIORITY: &[&str] = &["director", "chief"];
const CONSULTANT_C_SUITE: &[&str] = &["cfo", "cmo", "cto"];

/// Case-insensitive substring markers; no stemming or fuzzy matching.
pub fn is_fractional_role(title: &str) -> bool {
    let t = title.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| t.contains(n));

    any(FRACTIONAL_MARKERS)
        || (t.contains("contract") && any(CONTRACT_SENIORITY))
        || (t.contains("consultant") && any(CONSULTANT_C_SUITE))
}
