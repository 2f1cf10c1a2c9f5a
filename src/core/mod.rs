pub mod config;
pub mod errors;
pub mod logging;

pub use errors::{CorpusError, DimensionMismatch, ProviderError};
