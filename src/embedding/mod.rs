pub mod engine;
pub mod openai;
pub mod provider;

pub use engine::{BatchOptions, EmbeddingEngine};
pub use openai::OpenAiEmbeddings;
pub use provider::EmbeddingProvider;
