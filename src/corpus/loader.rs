use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::errors::CorpusError;

use super::types::{RuleCorpus, RuleRecord};

/// Where rule corpora come from.
///
/// The retrieval service only calls `load`; file layout, embedded fixtures,
/// and test corpora all hide behind this.
pub trait CorpusSource: Send + Sync {
    /// Produce the corpus. Zero valid rules is `CorpusError::NoValidRules`,
    /// never an empty `Ok`; downstream code treats a loaded corpus as
    /// non-empty.
    fn load(&self) -> Result<RuleCorpus, CorpusError>;

    /// Human-readable origin, for startup logs.
    fn describe(&self) -> String;
}

/// Corpus stored as a commented-JSON (`.jsonc`) file on disk.
pub struct JsonFileCorpus {
    path: PathBuf,
}

impl JsonFileCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for JsonFileCorpus {
    fn load(&self) -> Result<RuleCorpus, CorpusError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| CorpusError::Unreadable {
            path: self.path.clone(),
            source,
        })?;
        parse_corpus(&contents)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Deserialize)]
struct RawCorpus {
    version: String,
    #[serde(default)]
    jurisdiction: Option<String>,
    rules: Vec<serde_json::Value>,
}

/// Parse a comment-stripped-then-deserialized corpus out of raw `.jsonc`
/// text.
///
/// Individual bad records are skipped with a warning; the whole corpus is
/// rejected only when nothing survives.
pub fn parse_corpus(text: &str) -> Result<RuleCorpus, CorpusError> {
    let stripped = strip_jsonc_comments(text);
    let raw: RawCorpus = serde_json::from_str(&stripped).map_err(CorpusError::malformed)?;

    let mut rules: Vec<RuleRecord> = Vec::with_capacity(raw.rules.len());
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, value) in raw.rules.into_iter().enumerate() {
        let label = value
            .get("rule_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));

        let record: RuleRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!("Skipping malformed rule {}: {}", label, err);
                continue;
            }
        };

        let Some(record) = sanitize_record(record) else {
            tracing::warn!("Skipping incomplete rule {}", label);
            continue;
        };

        if !seen_ids.insert(record.rule_id.clone()) {
            tracing::warn!("Skipping duplicate rule id {}", record.rule_id);
            continue;
        }

        rules.push(record);
    }

    if rules.is_empty() {
        return Err(CorpusError::NoValidRules);
    }

    Ok(RuleCorpus {
        version: raw.version,
        jurisdiction: raw.jurisdiction,
        rules,
    })
}

/// Reject records missing the fields the rest of the engine assumes, and
/// tidy `contract_types` (trimmed, deduplicated, order preserved).
fn sanitize_record(mut record: RuleRecord) -> Option<RuleRecord> {
    if record.rule_id.trim().is_empty() || record.rule.trim().is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    record.contract_types = record
        .contract_types
        .into_iter()
        .map(|ct| ct.trim().to_string())
        .filter(|ct| !ct.is_empty() && seen.insert(ct.clone()))
        .collect();

    if record.contract_types.is_empty() {
        return None;
    }

    Some(record)
}

/// Remove `//` and `/* */` comments so the remainder is plain JSON.
///
/// Comment syntax inside string literals is left alone.
fn strip_jsonc_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut in_string = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if in_string {
            result.push(c);
            if c == '\\' && i + 1 < chars.len() {
                result.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
                i += 1;
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}
