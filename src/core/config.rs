//! File-based config loader (`knowledge-core.json`) with env-var fallback:
//! JSON field -> env var -> hard default, resolved independently per field.

use std::path::PathBuf;

use crate::search::budget;

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct StorageSection {
    pub path: Option<String>,
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SearchSection {
    pub min_relevance: Option<f64>,
    pub max_results: Option<usize>,
    pub enable_semantic: Option<bool>,
    pub enable_keyword: Option<bool>,
    pub result_grouping: Option<bool>,
    pub highlight_matches: Option<bool>,
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ChunkingSection {
    pub min_chunk_size: Option<usize>,
    pub max_chunk_size: Option<usize>,
    pub overlap_ratio: Option<f64>,
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BudgetsSection {
    pub max_chunk_content_size: Option<usize>,
    pub max_matched_chunks: Option<usize>,
    pub max_context_chunks: Option<usize>,
    pub max_result_content_size: Option<usize>,
    pub max_total_content_size: Option<usize>,
}

/// Top-level config loaded from `knowledge-core.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct RawCoreConfig {
    #[serde(default)]
    pub storage: StorageSection,
    pub index_dir: Option<String>,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub budgets: BudgetsSection,
}

/// Fully resolved configuration, every field defaulted.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub storage_path: PathBuf,
    pub index_dir: PathBuf,
    pub min_relevance: f64,
    pub max_results: usize,
    pub enable_semantic: bool,
    pub enable_keyword: bool,
    pub result_grouping: bool,
    pub highlight_matches: bool,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub overlap_ratio: f64,
    pub max_chunk_content_size: usize,
    pub max_matched_chunks: usize,
    pub max_context_chunks: usize,
    pub max_result_content_size: usize,
    pub max_total_content_size: usize,
}

const ENV_STORAGE_PATH: &str = "KNOWLEDGE_CORE_STORAGE_PATH";
const ENV_INDEX_DIR: &str = "KNOWLEDGE_CORE_INDEX_DIR";
const ENV_MIN_RELEVANCE: &str = "KNOWLEDGE_CORE_MIN_RELEVANCE";
const ENV_MAX_RESULTS: &str = "KNOWLEDGE_CORE_MAX_RESULTS";
const ENV_ENABLE_SEMANTIC: &str = "KNOWLEDGE_CORE_ENABLE_SEMANTIC";
const ENV_ENABLE_KEYWORD: &str = "KNOWLEDGE_CORE_ENABLE_KEYWORD";
const ENV_RESULT_GROUPING: &str = "KNOWLEDGE_CORE_RESULT_GROUPING";
const ENV_HIGHLIGHT_MATCHES: &str = "KNOWLEDGE_CORE_HIGHLIGHT_MATCHES";
const ENV_MIN_CHUNK_SIZE: &str = "KNOWLEDGE_CORE_MIN_CHUNK_SIZE";
const ENV_MAX_CHUNK_SIZE: &str = "KNOWLEDGE_CORE_MAX_CHUNK_SIZE";
const ENV_OVERLAP_RATIO: &str = "KNOWLEDGE_CORE_OVERLAP_RATIO";

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl RawCoreConfig {
    fn resolve(&self) -> CoreConfig {
        CoreConfig {
            storage_path: self
                .storage
                .path
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(env_or(ENV_STORAGE_PATH, "knowledge.db".to_string()))),
            index_dir: self
                .index_dir
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(env_or(ENV_INDEX_DIR, "index".to_string()))),
            min_relevance: self
                .search
                .min_relevance
                .unwrap_or_else(|| env_or(ENV_MIN_RELEVANCE, 0.1)),
            max_results: self
                .search
                .max_results
                .unwrap_or_else(|| env_or(ENV_MAX_RESULTS, 50)),
            enable_semantic: self
                .search
                .enable_semantic
                .unwrap_or_else(|| env_or(ENV_ENABLE_SEMANTIC, true)),
            enable_keyword: self
                .search
                .enable_keyword
                .unwrap_or_else(|| env_or(ENV_ENABLE_KEYWORD, true)),
            result_grouping: self
                .search
                .result_grouping
                .unwrap_or_else(|| env_or(ENV_RESULT_GROUPING, false)),
            highlight_matches: self
                .search
                .highlight_matches
                .unwrap_or_else(|| env_or(ENV_HIGHLIGHT_MATCHES, false)),
            min_chunk_size: self
                .chunking
                .min_chunk_size
                .unwrap_or_else(|| env_or(ENV_MIN_CHUNK_SIZE, 100)),
            max_chunk_size: self
                .chunking
                .max_chunk_size
                .unwrap_or_else(|| env_or(ENV_MAX_CHUNK_SIZE, 1500)),
            overlap_ratio: self
                .chunking
                .overlap_ratio
                .unwrap_or_else(|| env_or(ENV_OVERLAP_RATIO, 0.2)),
            max_chunk_content_size: self.budgets.max_chunk_content_size.unwrap_or(budget::MAX_CHUNK_CONTENT_SIZE),
            max_matched_chunks: self.budgets.max_matched_chunks.unwrap_or(budget::MAX_MATCHED_CHUNKS),
            max_context_chunks: self.budgets.max_context_chunks.unwrap_or(budget::MAX_CONTEXT_CHUNKS),
            max_result_content_size: self.budgets.max_result_content_size.unwrap_or(budget::MAX_RESULT_CONTENT_SIZE),
            max_total_content_size: self.budgets.max_total_content_size.unwrap_or(budget::MAX_TOTAL_CONTENT_SIZE),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        RawCoreConfig::default().resolve()
    }
}

/// Load `knowledge-core.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `./knowledge-core.json`
/// 2. `../knowledge-core.json`
/// 3. `KNOWLEDGE_CORE_CONFIG` env var path
///
/// Missing file -> `CoreConfig` built from env-var/default fallbacks (silent).
/// Parse error -> log a warning, fall back the same way.
pub fn load_core_config() -> CoreConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("knowledge-core.json"),
            PathBuf::from("../knowledge-core.json"),
        ];
        if let Ok(env_path) = std::env::var("KNOWLEDGE_CORE_CONFIG") {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawCoreConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("knowledge-core.json loaded from {}", path.display());
                    return cfg.resolve();
                }
                Err(e) => {
                    tracing::warn!(
                        "knowledge-core.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return RawCoreConfig::default().resolve();
                }
            },
            Err(_) => continue,
        }
    }

    RawCoreConfig::default().resolve()
}
