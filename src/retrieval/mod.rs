//! Semantic retrieval over the drafting-rule corpus.
//!
//! # Components
//!
//! - `types`: core data structures (NormalizedRule, EmbeddedRule, ScoredRule)
//! - `normalize`: rule-record flattening into embeddable text
//! - `similarity`: cosine scoring and top-k selection
//! - `cache`: durable on-disk snapshot plus the in-process slot
//! - `service`: the orchestrator the rest of an application calls

pub mod cache;
pub mod normalize;
pub mod service;
pub mod similarity;
pub mod types;


pub use cache::{CacheEntry, DurableCache, ProcessCache};
pub use normalize::{normalize, DEFAULT_JURISDICTION};
pub use service::RetrievalService;
pub use similarity::{cosine_similarity, top_k};
pub use types::{
    EmbeddedRule, InitOutcome, NormalizedRule, RetrievalStats, RuleFilter, RuleMetadata, ScoredRule,
};
