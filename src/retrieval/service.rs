//! Retrieval orchestration.
//!
//! `RetrievalService` owns the corpus snapshot and the embedding caches
//! behind one async lock, and is the only surface the rest of an
//! application calls: `initialize` loads and embeds the corpus,
//! `search_relevant_rules` ranks it against a query, the context builders
//! render prompt-ready text, and `get_relevant_rules` serves the static
//! filter that works without any provider.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::core::config::{resolve_api_key, AppPaths, RetrievalConfig, API_KEY_ENV};
use crate::core::errors::{CorpusError, ProviderError};
use crate::corpus::loader::{CorpusSource, JsonFileCorpus};
use crate::corpus::types::Severity;
use crate::embedding::{BatchOptions, EmbeddingEngine, OpenAiEmbeddings};

use super::cache::{DurableCache, ProcessCache};
use super::normalize::{normalize, DEFAULT_JURISDICTION};
use super::similarity;
use super::types::{
    EmbeddedRule, InitOutcome, NormalizedRule, RetrievalStats, RuleFilter, ScoredRule,
};

struct CorpusSnapshot {
    version: String,
    rules: Vec<NormalizedRule>,
}

/// Everything mutable sits behind one lock: the corpus snapshot, the warm
/// embedding slot, and the last provider failure. The same lock serializes
/// embedding generation, so concurrent cold searches cannot double-spend
/// provider quota.
struct EngineState {
    corpus: Option<CorpusSnapshot>,
    process: ProcessCache,
    last_provider_error: Option<String>,
}

pub struct RetrievalService {
    source: Arc<dyn CorpusSource>,
    engine: EmbeddingEngine,
    durable: DurableCache,
    min_score: f32,
    state: Mutex<EngineState>,
}

impl RetrievalService {
    /// Wire the production stack: file corpus, OpenAI-compatible provider,
    /// durable cache under the user data dir.
    pub fn new(paths: &AppPaths, config: &RetrievalConfig) -> Self {
        let api_key = resolve_api_key(paths);
        if api_key.is_none() {
            tracing::warn!(
                "No embedding credential ({} or {}); semantic search stays off until one appears",
                API_KEY_ENV,
                paths.secrets_path.display()
            );
        }

        let provider = Arc::new(OpenAiEmbeddings::from_config(config, api_key));
        let engine = EmbeddingEngine::new(
            provider,
            config.embedding_model.clone(),
            BatchOptions::from_config(config),
        );
        let durable = DurableCache::new(paths.cache_path.clone(), config.durable_cache_ttl());
        let source = Arc::new(JsonFileCorpus::new(paths.corpus_path.clone()));

        Self::with_parts(
            source,
            engine,
            durable,
            config.process_cache_ttl(),
            config.min_score,
        )
    }

    /// Assemble from parts. Tests inject stub providers and corpora here;
    /// so do hosts with a corpus that is not a file on disk.
    pub fn with_parts(
        source: Arc<dyn CorpusSource>,
        engine: EmbeddingEngine,
        durable: DurableCache,
        process_ttl: Duration,
        min_score: f32,
    ) -> Self {
        Self {
            source,
            engine,
            durable,
            min_score: min_score.clamp(-1.0, 1.0),
            state: Mutex::new(EngineState {
                corpus: None,
                process: ProcessCache::new(process_ttl),
                last_provider_error: None,
            }),
        }
    }

    /// Load the corpus, then bring embeddings up from the durable cache or
    /// the provider.
    ///
    /// A corpus that cannot be loaded is the only hard failure. A provider
    /// failure leaves the service serving keyword and static lookups, with
    /// `embeddings_ready` false in the outcome.
    pub async fn initialize(&self, use_cache: bool) -> Result<InitOutcome, CorpusError> {
        let mut guard = self.state.lock().await;

        let corpus = self.source.load()?;
        // Sources promise this; enforce it against impls that forget.
        if corpus.rules.is_empty() {
            return Err(CorpusError::NoValidRules);
        }
        let default_jurisdiction = corpus
            .jurisdiction
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .unwrap_or(DEFAULT_JURISDICTION);
        let snapshot = CorpusSnapshot {
            version: corpus.version.clone(),
            rules: corpus
                .rules
                .iter()
                .map(|record| normalize(record, default_jurisdiction))
                .collect(),
        };
        let rules_loaded = snapshot.rules.len();

        tracing::info!(
            "Loaded {} drafting rules (corpus {}) from {}",
            rules_loaded,
            snapshot.version,
            self.source.describe()
        );

        let mut warm: Option<Vec<EmbeddedRule>> = None;
        let mut used_durable_cache = false;

        if use_cache {
            if let Some(cached) =
                self.durable
                    .load(&snapshot.version, self.engine.model(), rules_loaded)
            {
                tracing::info!(
                    "Reusing {} cached embeddings for corpus {}",
                    cached.len(),
                    snapshot.version
                );
                warm = Some(cached);
                used_durable_cache = true;
            }
        }

        let mut provider_failure: Option<String> = None;
        if warm.is_none() {
            match self.embed_rules(&snapshot.version, &snapshot.rules).await {
                Ok(embedded) => warm = Some(embedded),
                Err(err) => {
                    tracing::warn!(
                        "Embedding generation failed, keyword fallback stays active: {}",
                        err
                    );
                    provider_failure = Some(err.to_string());
                }
            }
        }

        // Single commit point after the last await, so a caller dropping
        // this future mid-generation leaves prior state untouched.
        guard.corpus = Some(snapshot);
        guard.process.clear();
        guard.last_provider_error = provider_failure;
        let embeddings_ready = match warm {
            Some(embedded) => {
                guard.process.put(embedded);
                true
            }
            None => false,
        };

        Ok(InitOutcome {
            rules_loaded,
            embeddings_ready,
            used_durable_cache,
        })
    }

    /// Discard state and load fresh, e.g. after a corpus version bump.
    pub async fn reinitialize(&self, use_cache: bool) -> Result<InitOutcome, CorpusError> {
        self.teardown().await;
        self.initialize(use_cache).await
    }

    /// Drop the corpus and warm vectors. The durable cache file stays and
    /// can still serve a later `initialize`.
    pub async fn teardown(&self) {
        let mut guard = self.state.lock().await;
        guard.corpus = None;
        guard.process.clear();
        guard.last_provider_error = None;
    }

    /// Rank the corpus against a query.
    ///
    /// A blank query routes to the static severity filter. When embeddings
    /// cannot be produced the query falls back to case-insensitive keyword
    /// containment over rule text and id, in corpus order. Degraded paths
    /// return score 0 rather than an error; before `initialize` the result
    /// is simply empty.
    pub async fn search_relevant_rules(&self, query: &str, top_k: usize) -> Vec<ScoredRule> {
        let query = query.trim();
        let mut guard = self.state.lock().await;

        if guard.corpus.is_none() {
            tracing::warn!("Search called before initialization; returning nothing");
            return Vec::new();
        }

        if query.is_empty() {
            if let Some(snapshot) = guard.corpus.as_ref() {
                return default_selection(&snapshot.rules, top_k);
            }
        }

        if let Some(embedded) = self.ensure_embeddings(&mut guard).await {
            match self.engine.embed_one(query).await {
                Ok(query_vector) => {
                    let mut ranked = similarity::top_k(&query_vector, &embedded, top_k);
                    ranked.retain(|scored| scored.score >= self.min_score);
                    return ranked;
                }
                Err(err) => {
                    tracing::warn!("Query embedding failed, using keyword fallback: {}", err);
                    guard.last_provider_error = Some(err.to_string());
                }
            }
        }

        match guard.corpus.as_ref() {
            Some(snapshot) => keyword_fallback(&snapshot.rules, query, top_k),
            None => Vec::new(),
        }
    }

    /// Render ranked rules as labeled blocks for prompt injection.
    ///
    /// Empty string when nothing ranks, so callers can detect "no context
    /// to inject" without parsing.
    pub async fn build_semantic_context(&self, query: &str, max_rules: usize) -> String {
        let results = self.search_relevant_rules(query, max_rules).await;
        format_context_blocks(&results)
    }

    /// One line per rule, for tight prompt-token budgets.
    pub async fn build_compact_context(&self, query: &str, max_rules: usize) -> String {
        let results = self.search_relevant_rules(query, max_rules).await;
        format_compact(&results)
    }

    /// Static metadata filter, usable even when embeddings never came up.
    ///
    /// All provided criteria must match. Severity defaults to high or
    /// medium when unspecified. Results keep corpus order, unscored.
    pub async fn get_relevant_rules(&self, filter: &RuleFilter) -> Vec<NormalizedRule> {
        let guard = self.state.lock().await;
        match &guard.corpus {
            Some(snapshot) => snapshot
                .rules
                .iter()
                .filter(|rule| filter_matches(rule, filter))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn embeddings_ready(&self) -> bool {
        self.state.lock().await.process.get().is_some()
    }

    pub async fn stats(&self) -> RetrievalStats {
        let guard = self.state.lock().await;
        RetrievalStats {
            rule_count: guard
                .corpus
                .as_ref()
                .map(|snapshot| snapshot.rules.len())
                .unwrap_or(0),
            corpus_version: guard
                .corpus
                .as_ref()
                .map(|snapshot| snapshot.version.clone()),
            embeddings_ready: guard.process.get().is_some(),
            last_provider_error: guard.last_provider_error.clone(),
        }
    }

    /// Warm vectors for the current corpus, regenerating when the process
    /// slot has expired. `None` means the provider failed and the caller
    /// should degrade.
    ///
    /// Runs with the state lock held; the first caller after expiry pays
    /// the regeneration cost while later callers wait and then hit the
    /// fresh slot.
    async fn ensure_embeddings(&self, state: &mut EngineState) -> Option<Arc<Vec<EmbeddedRule>>> {
        if let Some(warm) = state.process.get() {
            return Some(warm);
        }

        let (version, rules) = match state.corpus.as_ref() {
            Some(snapshot) => (snapshot.version.clone(), snapshot.rules.clone()),
            None => return None,
        };

        tracing::info!("Process embedding slot is cold, regenerating {} rules", rules.len());
        match self.embed_rules(&version, &rules).await {
            Ok(embedded) => {
                state.last_provider_error = None;
                Some(state.process.put(embedded))
            }
            Err(err) => {
                tracing::warn!("Embedding regeneration failed: {}", err);
                state.last_provider_error = Some(err.to_string());
                None
            }
        }
    }

    /// Embed every rule and write through to the durable cache. Atomic:
    /// either all vectors exist or none do.
    async fn embed_rules(
        &self,
        version: &str,
        rules: &[NormalizedRule],
    ) -> Result<Vec<EmbeddedRule>, ProviderError> {
        let texts: Vec<String> = rules.iter().map(|rule| rule.text.clone()).collect();
        let vectors = self.engine.embed_batch(&texts).await?;

        let embedded: Vec<EmbeddedRule> = rules
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(rule, embedding)| EmbeddedRule { rule, embedding })
            .collect();

        tracing::info!(
            "Generated {} rule embeddings with {} via {}",
            embedded.len(),
            self.engine.model(),
            self.engine.provider_name()
        );
        self.durable.store(version, self.engine.model(), &embedded);
        Ok(embedded)
    }
}

/// AND of all provided criteria; contract type and category compare
/// case-insensitively.
fn filter_matches(rule: &NormalizedRule, filter: &RuleFilter) -> bool {
    let severity_ok = match filter.severity {
        Some(wanted) => rule.metadata.severity == wanted,
        None => matches!(rule.metadata.severity, Severity::High | Severity::Medium),
    };
    if !severity_ok {
        return false;
    }

    if let Some(wanted) = &filter.contract_type {
        let found = rule
            .metadata
            .contract_types
            .iter()
            .any(|ct| ct.eq_ignore_ascii_case(wanted));
        if !found {
            return false;
        }
    }

    if let Some(wanted) = &filter.category {
        let found = rule
            .metadata
            .category
            .as_deref()
            .map(|category| category.eq_ignore_ascii_case(wanted))
            .unwrap_or(false);
        if !found {
            return false;
        }
    }

    true
}

/// What a blank query gets: the rules a reviewer cares about by default,
/// unscored, capped at the requested count.
fn default_selection(rules: &[NormalizedRule], limit: usize) -> Vec<ScoredRule> {
    let filter = RuleFilter::default();
    let mut selected: Vec<ScoredRule> = rules
        .iter()
        .filter(|rule| filter_matches(rule, &filter))
        .map(|rule| ScoredRule {
            rule: rule.clone(),
            score: 0.0,
        })
        .collect();
    selected.truncate(limit);
    selected
}

/// Case-insensitive containment of the query in rule text or id.
fn keyword_fallback(rules: &[NormalizedRule], query: &str, limit: usize) -> Vec<ScoredRule> {
    let needle = query.to_lowercase();
    let mut matches: Vec<ScoredRule> = rules
        .iter()
        .filter(|rule| {
            rule.text.to_lowercase().contains(&needle) || rule.id.to_lowercase().contains(&needle)
        })
        .map(|rule| ScoredRule {
            rule: rule.clone(),
            score: 0.0,
        })
        .collect();
    matches.truncate(limit);
    matches
}

fn format_context_blocks(results: &[ScoredRule]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut context = String::new();
    for scored in results {
        let meta = &scored.rule.metadata;
        context.push_str(&format!(
            "[{}] (relevance: {:.1}%)\n{}\n",
            scored.rule.id,
            scored.score * 100.0,
            scored.rule.text
        ));
        context.push_str(&format!(
            "Severity: {} | Contract types: {}",
            meta.severity,
            meta.contract_types.join(", ")
        ));
        if let Some(category) = &meta.category {
            context.push_str(&format!(" | Category: {}", category));
        }
        context.push_str("\n\n");
    }

    context.trim_end().to_string()
}

fn format_compact(results: &[ScoredRule]) -> String {
    results
        .iter()
        .map(|scored| format!("- {}: {}", scored.rule.id, scored.rule.text.replace('\n', "; ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::types::RuleMetadata;

    fn rule(id: &str, severity: Severity, types: &[&str], category: Option<&str>) -> NormalizedRule {
        NormalizedRule {
            id: id.to_string(),
            text: format!("Rule: the {} rule", id),
            metadata: RuleMetadata {
                jurisdiction: "general".to_string(),
                severity,
                contract_types: types.iter().map(|t| t.to_string()).collect(),
                category: category.map(str::to_string),
                reference: None,
            },
        }
    }

    #[test]
    fn unspecified_severity_means_high_or_medium() {
        let filter = RuleFilter::default();
        assert!(filter_matches(&rule("a", Severity::High, &["msa"], None), &filter));
        assert!(filter_matches(&rule("b", Severity::Medium, &["msa"], None), &filter));
        assert!(!filter_matches(&rule("c", Severity::Low, &["msa"], None), &filter));
    }

    #[test]
    fn explicit_severity_overrides_the_default_union() {
        let filter = RuleFilter {
            severity: Some(Severity::Low),
            ..Default::default()
        };
        assert!(filter_matches(&rule("a", Severity::Low, &["msa"], None), &filter));
        assert!(!filter_matches(&rule("b", Severity::High, &["msa"], None), &filter));
    }

    #[test]
    fn all_provided_criteria_must_hold() {
        let filter = RuleFilter {
            contract_type: Some("NDA".to_string()),
            severity: Some(Severity::High),
            category: Some("Confidentiality".to_string()),
        };

        let matching = rule("a", Severity::High, &["nda", "msa"], Some("confidentiality"));
        assert!(filter_matches(&matching, &filter));

        let wrong_type = rule("b", Severity::High, &["msa"], Some("confidentiality"));
        assert!(!filter_matches(&wrong_type, &filter));

        let no_category = rule("c", Severity::High, &["nda"], None);
        assert!(!filter_matches(&no_category, &filter));
    }

    #[test]
    fn context_blocks_carry_id_percentage_and_metadata() {
        let scored = vec![ScoredRule {
            rule: rule("PAY-1", Severity::High, &["msa", "services"], Some("payment")),
            score: 0.8765,
        }];

        let context = format_context_blocks(&scored);
        assert!(context.starts_with("[PAY-1] (relevance: 87.7%)"));
        assert!(context.contains("Rule: the PAY-1 rule"));
        assert!(context.contains("Severity: high | Contract types: msa, services | Category: payment"));
        assert!(!context.ends_with('\n'));
    }

    #[test]
    fn category_is_omitted_from_blocks_when_absent() {
        let scored = vec![ScoredRule {
            rule: rule("a", Severity::Medium, &["msa"], None),
            score: 0.5,
        }];

        let context = format_context_blocks(&scored);
        assert!(context.contains("Severity: medium | Contract types: msa"));
        assert!(!context.contains("Category:"));
    }

    #[test]
    fn empty_results_render_as_empty_strings() {
        assert_eq!(format_context_blocks(&[]), "");
        assert_eq!(format_compact(&[]), "");
    }

    #[test]
    fn compact_lines_flatten_multiline_text() {
        let mut multiline = rule("a", Severity::High, &["msa"], None);
        multiline.text = "Rule: first line\nBad example: second line".to_string();
        let scored = vec![
            ScoredRule { rule: multiline, score: 0.9 },
            ScoredRule { rule: rule("b", Severity::Low, &["msa"], None), score: 0.1 },
        ];

        let compact = format_compact(&scored);
        let lines: Vec<&str> = compact.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "- a: Rule: first line; Bad example: second line");
        assert!(lines[1].starts_with("- b: "));
    }

    #[test]
    fn keyword_fallback_matches_text_or_id_in_corpus_order() {
        let rules = vec![
            rule("INDEM-1", Severity::High, &["msa"], None),
            rule("PAY-1", Severity::High, &["msa"], None),
            rule("PAY-2", Severity::Low, &["msa"], None),
        ];

        let by_id = keyword_fallback(&rules, "pay", 10);
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id[0].rule.id, "PAY-1");
        assert_eq!(by_id[1].rule.id, "PAY-2");
        assert!(by_id.iter().all(|scored| scored.score == 0.0));

        let capped = keyword_fallback(&rules, "rule", 2);
        assert_eq!(capped.len(), 2);

        assert!(keyword_fallback(&rules, "zoning", 10).is_empty());
    }

    #[test]
    fn default_selection_caps_and_keeps_order() {
        let rules = vec![
            rule("a", Severity::High, &["msa"], None),
            rule("b", Severity::Low, &["msa"], None),
            rule("c", Severity::Medium, &["msa"], None),
            rule("d", Severity::High, &["msa"], None),
        ];

        let selected = default_selection(&rules, 2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].rule.id, "a");
        assert_eq!(selected[1].rule.id, "c");
    }
}
