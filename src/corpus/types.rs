use serde::{Deserialize, Serialize};

/// How strongly a drafting rule binds.
///
/// The corpus file spells these lowercase. Reviewers act on high and medium
/// by default; low is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One drafting rule as it appears in the corpus file.
///
/// The loader guarantees each surviving record has a unique `rule_id`, a
/// non-empty `rule`, and at least one contract type. Downstream code trusts
/// those checks instead of repeating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub rule_id: String,
    #[serde(default)]
    pub category: Option<String>,
    pub rule: String,
    #[serde(default)]
    pub bad_example: Option<String>,
    #[serde(default)]
    pub good_example: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    pub severity: Severity,
    pub contract_types: Vec<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// A validated corpus: the declared version plus the rules that survived
/// loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCorpus {
    pub version: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    pub rules: Vec<RuleRecord>,
}
