//! Semantic retrieval core for a legal-document drafting assistant.
//!
//! Selects, from a corpus of drafting-rule records, the subset most
//! relevant to a query or document, for injection into a language-model
//! prompt.
//!
//! # Components
//!
//! - `corpus`: commented-JSON rule corpus loading and validation
//! - `embedding`: OpenAI-compatible embedding provider and batching engine
//! - `retrieval`: normalization, similarity, two-tier caching, and the
//!   orchestrating `RetrievalService`
//! - `core`: configuration, error taxonomy, logging

pub mod core;
pub mod corpus;
pub mod embedding;
pub mod retrieval;

pub use crate::core::config::{AppPaths, RetrievalConfig};
pub use crate::core::errors::{CorpusError, DimensionMismatch, ProviderError};
pub use crate::corpus::{CorpusSource, JsonFileCorpus, RuleCorpus, RuleRecord, Severity};
pub use crate::embedding::{BatchOptions, EmbeddingEngine, EmbeddingProvider, OpenAiEmbeddings};
pub use crate::retrieval::{
    InitOutcome, NormalizedRule, RetrievalService, RetrievalStats, RuleFilter, ScoredRule,
};
