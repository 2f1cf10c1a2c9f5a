use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;

/// Environment variable consulted before the secrets file for the embedding
/// API credential.
pub const API_KEY_ENV: &str = "LEXDRAFT_API_KEY";

/// Tunable knobs for the retrieval engine.
///
/// Read from the `retrieval:` section of `config.yml`; every field has a
/// default so a fresh install works with no config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Base URL of the OpenAI-compatible embeddings endpoint.
    pub provider_base_url: String,
    /// Embedding model identifier. Changing it invalidates every cached
    /// vector; the caches key on it.
    pub embedding_model: String,
    /// Maximum texts per provider call.
    pub batch_size: usize,
    /// Pause between batch chunks, to stay under provider rate limits.
    pub batch_delay_ms: u64,
    /// Hard timeout applied to each provider HTTP request.
    pub request_timeout_secs: u64,
    /// Number of rules a search returns when the caller does not say.
    pub default_top_k: usize,
    /// Floor on the cosine score of semantic results. `-1.0` keeps
    /// everything; raise it to drop weakly related rules.
    pub min_score: f32,
    /// Age limit for the on-disk embedding snapshot.
    pub durable_cache_ttl_hours: u64,
    /// Age limit for the in-memory embedding slot.
    pub process_cache_ttl_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider_base_url: "https://api.openai.com".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            batch_size: 100,
            batch_delay_ms: 200,
            request_timeout_secs: 30,
            default_top_k: 5,
            min_score: -1.0,
            durable_cache_ttl_hours: 24 * 7,
            process_cache_ttl_secs: 60 * 60,
        }
    }
}

/// Shape of `config.yml`. Other application sections are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    retrieval: RetrievalConfig,
}

impl RetrievalConfig {
    /// Load from the first config file found, falling back to defaults.
    ///
    /// A missing or unparseable file is not an error; the engine must come up
    /// on a fresh install.
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from(&config_path(paths))
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(file) => file.retrieval,
                Err(err) => {
                    tracing::warn!("Ignoring unparseable config {}: {}", path.display(), err);
                    RetrievalConfig::default()
                }
            },
            Err(_) => RetrievalConfig::default(),
        };
        config.clamp();
        config
    }

    /// Pull every numeric knob back into a workable range. The durable TTL
    /// cap also keeps the hours-to-seconds conversion inside u64.
    fn clamp(&mut self) {
        self.batch_size = self.batch_size.clamp(1, 2048);
        self.batch_delay_ms = self.batch_delay_ms.min(60_000);
        self.default_top_k = self.default_top_k.clamp(1, 50);
        self.min_score = self.min_score.clamp(-1.0, 1.0);
        self.durable_cache_ttl_hours = self.durable_cache_ttl_hours.clamp(1, 24 * 365);
        self.process_cache_ttl_secs = self.process_cache_ttl_secs.min(7 * 24 * 3600);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = Self::default().request_timeout_secs;
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn durable_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.durable_cache_ttl_hours * 60 * 60)
    }

    pub fn process_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.process_cache_ttl_secs)
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("LEXDRAFT_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let user_config = paths.user_data_dir.join("config.yml");
    if user_config.exists() {
        return user_config;
    }

    paths.project_root.join("config.yml")
}

/// Resolve the embedding API credential.
///
/// Order: `LEXDRAFT_API_KEY`, then `api_key:` in the secrets file. `None`
/// puts the engine in keyword/static fallback mode rather than failing
/// startup.
pub fn resolve_api_key(paths: &AppPaths) -> Option<String> {
    if let Ok(key) = env::var(API_KEY_ENV) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Some(key);
        }
    }

    read_api_key_file(&paths.secrets_path)
}

fn read_api_key_file(path: &Path) -> Option<String> {
    #[derive(Deserialize)]
    struct SecretsFile {
        api_key: Option<String>,
    }

    let contents = fs::read_to_string(path).ok()?;
    let secrets: SecretsFile = serde_yaml::from_str(&contents).ok()?;
    let key = secrets.api_key?.trim().to_string();
    (!key.is_empty()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_constants() {
        let config = RetrievalConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.durable_cache_ttl(), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.process_cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.min_score, -1.0);
    }

    #[test]
    fn load_from_reads_retrieval_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "editor:\n  autosave: true\nretrieval:\n  batch_size: 25\n  embedding_model: text-embedding-3-large\n",
        )
        .unwrap();

        let config = RetrievalConfig::load_from(&path);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        // Unspecified fields keep their defaults.
        assert_eq!(config.default_top_k, 5);
    }

    #[test]
    fn load_from_missing_or_garbage_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let missing = RetrievalConfig::load_from(&dir.path().join("nope.yml"));
        assert_eq!(missing.batch_size, 100);

        let garbage_path = dir.path().join("config.yml");
        std::fs::write(&garbage_path, "retrieval: [not, a, mapping]").unwrap();
        let garbage = RetrievalConfig::load_from(&garbage_path);
        assert_eq!(garbage.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn clamp_repairs_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "retrieval:\n  batch_size: 0\n  min_score: 4.5\n  request_timeout_secs: 0\n",
        )
        .unwrap();

        let config = RetrievalConfig::load_from(&path);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.min_score, 1.0);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn absurd_ttl_values_are_capped_before_any_duration_math() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "retrieval:\n  durable_cache_ttl_hours: 18446744073709551615\n  process_cache_ttl_secs: 18446744073709551615\n  batch_delay_ms: 18446744073709551615\n",
        )
        .unwrap();

        let config = RetrievalConfig::load_from(&path);
        // u64::MAX hours must survive the hours-to-seconds conversion.
        assert_eq!(config.durable_cache_ttl_hours, 24 * 365);
        assert_eq!(config.durable_cache_ttl(), Duration::from_secs(24 * 365 * 3600));
        assert_eq!(config.process_cache_ttl(), Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.batch_delay(), Duration::from_secs(60));
    }

    #[test]
    fn secrets_file_supplies_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        std::fs::write(&path, "api_key: \"sk-test-123\"\n").unwrap();

        assert_eq!(read_api_key_file(&path), Some("sk-test-123".to_string()));
        assert_eq!(read_api_key_file(&dir.path().join("absent.yaml")), None);
    }

    #[test]
    fn blank_api_key_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        std::fs::write(&path, "api_key: \"   \"\n").unwrap();

        assert_eq!(read_api_key_file(&path), None);
    }
}
