pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{resolve_api_key, RetrievalConfig, API_KEY_ENV};
