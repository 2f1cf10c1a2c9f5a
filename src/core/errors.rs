use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or validate the rule corpus.
///
/// This is the only error the retrieval service surfaces to callers: with no
/// corpus there is nothing to search at all. Every other failure inside the
/// engine degrades to keyword or static filtering instead of propagating.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read rule corpus at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rule corpus is not valid JSON: {0}")]
    Malformed(String),
    #[error("rule corpus contains no valid rules")]
    NoValidRules,
}

impl CorpusError {
    pub fn malformed<E: std::fmt::Display>(err: E) -> Self {
        CorpusError::Malformed(err.to_string())
    }
}

/// Classified failure from the embedding provider.
///
/// Never shown to end users directly: the retrieval service logs it and falls
/// back to keyword search.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding API credential is missing")]
    MissingCredential,
    #[error("embedding provider rejected the API credential")]
    Unauthorized,
    #[error("embedding provider rate limit exceeded")]
    RateLimited,
    #[error("embedding provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("embedding request failed: {0}")]
    Network(String),
    #[error("embedding provider returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn network<E: std::fmt::Display>(err: E) -> Self {
        ProviderError::Network(err.to_string())
    }

    pub fn malformed<E: std::fmt::Display>(err: E) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}

/// Two vectors of different lengths were compared.
///
/// Should not happen in correct operation; when it does, it means vectors
/// from an older embedding model survived cache invalidation.
#[derive(Debug, Error)]
#[error("embedding length mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}
