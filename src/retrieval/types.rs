use serde::{Deserialize, Serialize};

use crate::corpus::types::Severity;

/// Structured facts carried alongside a rule's embeddable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub jurisdiction: String,
    pub severity: Severity,
    pub contract_types: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

/// A rule flattened for embedding: identifier, prompt-ready text, metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRule {
    pub id: String,
    pub text: String,
    pub metadata: RuleMetadata,
}

/// A normalized rule plus its vector.
///
/// Every vector in one corpus shares a dimension and came from one model;
/// the caches enforce that by keying on model and corpus version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedRule {
    pub rule: NormalizedRule,
    pub embedding: Vec<f32>,
}

/// Search output. The raw vector is dropped; callers see the score only.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRule {
    pub rule: NormalizedRule,
    /// Cosine similarity in [-1, 1]. 0 for keyword-fallback matches.
    pub score: f32,
}

/// Criteria for the static (non-semantic) rule lookup.
///
/// Every populated field must match for a rule to be included.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub contract_type: Option<String>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
}

/// Snapshot of the service, for health and debug surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalStats {
    pub rule_count: usize,
    pub corpus_version: Option<String>,
    pub embeddings_ready: bool,
    pub last_provider_error: Option<String>,
}

/// What `initialize` accomplished.
#[derive(Debug, Clone, Copy)]
pub struct InitOutcome {
    pub rules_loaded: usize,
    pub embeddings_ready: bool,
    pub used_durable_cache: bool,
}
