//! Embedding provider configuration.

use serde::{Deserialize, Serialize};

/// Which embedding backend to use, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "none", "mock", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Model input limit in tokens; bounds chunk size
    pub max_input_tokens: usize,

    /// Provider base URL (Ollama falls back to `OLLAMA_URL`)
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            max_input_tokens: 8191,
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Whether a provider is configured at all.
    pub fn is_enabled(&self) -> bool {
        !self.provider.is_empty() && self.provider != "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "none");
        assert_eq!(config.max_input_tokens, 8191);
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EmbeddingConfig =
            serde_yaml::from_str("provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n")
                .unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.dimensions, 768);
        assert_eq!(config.max_input_tokens, 8191);
        assert_eq!(config.endpoint, None);
    }
}
