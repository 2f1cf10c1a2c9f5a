use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem locations the retrieval engine reads and writes.
///
/// The durable embedding cache lives under `user_data_dir` so it survives
/// process restarts for a given device; everything held in memory is gone on
/// restart by design.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Fixed storage key for the durable embedding cache.
    pub cache_path: PathBuf,
    pub secrets_path: PathBuf,
    /// Default location of the drafting-rule corpus.
    pub corpus_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        let log_dir = user_data_dir.join("logs");
        let cache_path = user_data_dir.join("rule_embeddings.json");
        let secrets_path = user_data_dir.join("secrets.yaml");
        let corpus_path = discover_corpus_path(&project_root);

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            cache_path,
            secrets_path,
            corpus_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("LEXDRAFT_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("rules").is_dir() || manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_corpus_path(project_root: &Path) -> PathBuf {
    if let Ok(path) = env::var("LEXDRAFT_RULES_PATH") {
        return PathBuf::from(path);
    }

    project_root.join("rules").join("drafting_rules.jsonc")
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("LEXDRAFT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("LexDraft");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("LexDraft");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("lexdraft")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
