use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DocumentConfig {
    /// Path to the document; may instead come from the `--doc` flag.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_proximity_chars")]
    pub proximity_chars: usize,
    #[serde(default = "default_min_context_chars")]
    pub min_context_chars: usize,
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
            min_score: default_min_score(),
            proximity_chars: default_proximity_chars(),
            min_context_chars: default_min_context_chars(),
            hybrid_alpha: default_hybrid_alpha(),
        }
    }
}

fn default_backend() -> String {
    "keyword".to_string()
}
fn default_chunk_size() -> usize {
    2000
}
fn default_overlap() -> usize {
    500
}
fn default_top_k() -> usize {
    10
}
fn default_min_score() -> f64 {
    0.1
}
fn default_proximity_chars() -> usize {
    200
}
fn default_min_context_chars() -> usize {
    100
}
fn default_hybrid_alpha() -> f64 {
    0.6
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Model name; omitted from the request payload when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_api_timeout_secs(),
            max_retries: default_api_max_retries(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:3000/v1/chat/completions".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f64 {
    0.0
}
fn default_api_timeout_secs() -> u64 {
    120
}
fn default_api_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Provider endpoint override (used by the Ollama provider).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load configuration from a TOML file, falling back to built-in defaults
/// when the file does not exist. All values are validated either way.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return validate(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(config)
}

fn validate(config: Config) -> Result<Config> {
    // Validate retrieval
    if config.retrieval.chunk_size == 0 {
        anyhow::bail!("retrieval.chunk_size must be > 0");
    }

    if config.retrieval.overlap >= config.retrieval.chunk_size {
        anyhow::bail!("retrieval.overlap must be < retrieval.chunk_size");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.min_score) {
        anyhow::bail!("retrieval.min_score must be in [0.0, 1.0]");
    }

    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        anyhow::bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }

    match config.retrieval.backend.as_str() {
        "keyword" | "hybrid" => {}
        other => anyhow::bail!(
            "Unknown retrieval backend: '{}'. Must be keyword or hybrid.",
            other
        ),
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.retrieval.backend == "hybrid" && !config.embedding.is_enabled() {
        anyhow::bail!("retrieval.backend = \"hybrid\" requires an enabled [embedding] provider");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_from_str(content: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/docask.toml")).unwrap();
        assert_eq!(config.retrieval.backend, "keyword");
        assert_eq!(config.retrieval.chunk_size, 2000);
        assert_eq!(config.retrieval.overlap, 500);
        assert_eq!(config.retrieval.top_k, 10);
        assert!((config.retrieval.min_score - 0.1).abs() < 1e-9);
        assert_eq!(config.retrieval.proximity_chars, 200);
        assert_eq!(config.retrieval.min_context_chars, 100);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = load_from_str(
            r#"
[document]
path = "docs/manual.md"

[retrieval]
chunk_size = 1000
overlap = 100
"#,
        )
        .unwrap();
        assert_eq!(config.document.path.as_deref(), Some(Path::new("docs/manual.md")));
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.overlap, 100);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.api.url, "http://localhost:3000/v1/chat/completions");
        assert!(config.api.model.is_none());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let result = load_from_str("[retrieval]\nchunk_size = 100\noverlap = 100\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = load_from_str("[retrieval]\nbackend = \"semantic\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_hybrid_requires_embedding_provider() {
        let result = load_from_str("[retrieval]\nbackend = \"hybrid\"\n");
        assert!(result.is_err());

        let config = load_from_str(
            r#"
[retrieval]
backend = "hybrid"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
"#,
        )
        .unwrap();
        assert_eq!(config.retrieval.backend, "hybrid");
        assert!(config.embedding.is_enabled());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let result = load_from_str("[embedding]\nprovider = \"openai\"\n");
        assert!(result.is_err());
    }
}
