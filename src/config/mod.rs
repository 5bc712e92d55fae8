// Configuration management module
// TOML settings passed explicitly to every component constructor

pub mod settings;

pub use settings::{
    Config, ConfigError, DEFAULT_EMBEDDING_DIMENSION, EmbeddingConfig, OllamaConfig, PathsConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
