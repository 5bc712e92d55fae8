
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::{Result, RetrievalError};

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const MAX_EMBEDDING_DIMENSION: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Fixed vector width of every built index
    pub dimension: usize,
    /// Try the Ollama model before falling back to TF-IDF
    pub prefer_model: bool,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            prefer_model: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            batch_size: 32,
        }
    }
}

/// Where content is read from and where the database and index snapshots are written.
/// Relative paths resolve against the config base directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub content_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub database_name: String,
    pub snapshot: String,
}

impl Default for PathsConfig {
    #[inline]
    fn default() -> Self {
        Self {
            content_dir: None,
            output_dir: None,
            database_name: "documents.db".to_string(),
            snapshot: "v1".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    DirectoryError,
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid snapshot name: '{0}' (must be non-empty without path separators)")]
    InvalidSnapshotName(String),
    #[error("Invalid value for {0}: '{1}'")]
    InvalidOverride(String, String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for RetrievalError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        Self::ConfigInvalid(error.to_string())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::with_base_dir(PathBuf::from("."))
    }
}

impl Config {
    #[inline]
    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            ollama: OllamaConfig::default(),
            paths: PathsConfig::default(),
            base_dir: base_dir.into(),
        }
    }

    /// Default per-user configuration directory
    #[inline]
    pub fn config_dir() -> std::result::Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("kb-retrieval"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from a directory, falling back to defaults when the file is absent
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        let config_path = config_dir.join("config.toml");

        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            let config = Self::with_base_dir(config_dir);
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content).map_err(ConfigError::from)?;
        config.base_dir = config_dir.to_path_buf();

        config.validate()?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply `CHUNK_SIZE`, `CHUNK_OVERLAP`, `EMBEDDING_DIM`, `CONTENT_DIR` and `OUTPUT_DIR`
    #[inline]
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source, then re-validate
    #[inline]
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_override("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = lookup("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_override("CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = lookup("EMBEDDING_DIM") {
            self.embedding.dimension = parse_override("EMBEDDING_DIM", &value)?;
        }
        if let Some(value) = lookup("CONTENT_DIR") {
            self.paths.content_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("OUTPUT_DIR") {
            self.paths.output_dir = Some(PathBuf::from(value));
        }

        self.validate()?;
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.chunking.validate()?;

        if !(1..=MAX_EMBEDDING_DIMENSION).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        let snapshot = &self.paths.snapshot;
        if snapshot.trim().is_empty() || snapshot.contains(['/', '\\']) {
            return Err(ConfigError::InvalidSnapshotName(snapshot.clone()));
        }

        self.ollama.validate()
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    #[inline]
    pub fn content_dir(&self) -> PathBuf {
        self.resolve(self.paths.content_dir.as_deref(), "content")
    }

    #[inline]
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(self.paths.output_dir.as_deref(), "data")
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.output_dir().join(&self.paths.database_name)
    }

    /// Directory holding the index snapshot blobs
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.output_dir().join("index")
    }

    #[inline]
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir().join("manifest.json")
    }

    #[inline]
    pub fn snapshot_name(&self) -> &str {
        &self.paths.snapshot
    }

    fn resolve(&self, configured: Option<&Path>, default: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.base_dir.join(path),
            None => self.base_dir.join(default),
        }
    }
}

fn parse_override<T: std::str::FromStr>(
    name: &str,
    value: &str,
) -> std::result::Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride(name.to_string(), value.to_string()))
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> std::result::Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
