pub mod loader;
pub mod types;

pub use loader::{parse_corpus, CorpusSource, JsonFileCorpus};
pub use types::{RuleCorpus, RuleRecord, Severity};
