//! Ingestion configuration.
//!
//! Read from `.planscope/ingest.yaml` in the workspace. Every section and
//! field is optional; missing values take their defaults.

use planscope_core::config::STATE_DIR;
use planscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunk::ChunkOptions;
use crate::embeddings::EmbeddingConfig;
use crate::keywords::DEFAULT_MAX_KEYWORDS;
use crate::pacing::PacingPolicy;
use crate::quality::DEFAULT_THRESHOLD;
use crate::store::StoreConfig;

const CONFIG_FILE: &str = "ingest.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunking: ChunkOptions,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub pacing: PacingPolicy,
    pub timeouts: TimeoutConfig,
    pub quality: QualityConfig,
    pub keywords: KeywordConfig,
}

/// Per-call time budgets, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub download_secs: u64,
    pub extract_secs: u64,
    pub embed_secs: u64,
    pub store_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            download_secs: 60,
            extract_secs: 120,
            embed_secs: 300,
            store_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub threshold: f64,
    /// Keep low-quality chunks out of embedding and storage
    pub drop_low_quality: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            drop_low_quality: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub max_keywords: usize,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

impl IngestConfig {
    /// Chunking options with the embedding limit applied when a provider is set.
    pub fn effective_chunking(&self) -> ChunkOptions {
        let mut options = self.chunking.clone();
        if self.embedding.is_enabled() {
            options.embedding_max_tokens = options
                .embedding_max_tokens
                .min(self.embedding.max_input_tokens);
        }
        options
    }
}

/// Load the workspace's ingest configuration, or defaults if there is none.
pub fn load_config(workspace: &Path) -> AppResult<IngestConfig> {
    let path = get_config_path(workspace);
    if !path.exists() {
        tracing::debug!("No ingest config at {:?}, using defaults", path);
        return Ok(IngestConfig::default());
    }
    load_config_file(&path)
}

/// Load an ingest configuration from an explicit file.
pub fn load_config_file(path: &Path) -> AppResult<IngestConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read ingest config at {:?}: {}", path, e))
    })?;
    if content.trim().is_empty() {
        return Ok(IngestConfig::default());
    }
    let config: IngestConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse ingest config at {:?}: {}", path, e))
    })?;
    config.pacing.validate()?;
    tracing::debug!("Loaded ingest config from {:?}", path);
    Ok(config)
}

/// Save the ingest configuration into the workspace.
pub fn save_config(workspace: &Path, config: &IngestConfig) -> AppResult<()> {
    let path = get_config_path(workspace);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write ingest config to {:?}: {}", path, e))
    })?;

    tracing::debug!("Saved ingest config to {:?}", path);
    Ok(())
}

pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join(CONFIG_FILE)
}
