// Configuration management module
// Resolves service endpoints and local directories from the environment

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://ollama:11434";
pub const DEFAULT_VECTOR_DB_DIR: &str = "/vector_db";
pub const DEFAULT_UPLOAD_DIR: &str = "/uploads";
pub const DEFAULT_GENERATION_MODEL: &str = "qwen2:0.5b";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Runtime configuration resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the Ollama runtime serving embeddings and generation
    pub ollama_url: Url,
    /// Directory backing the vector store
    pub vector_db_dir: PathBuf,
    /// Directory where raw uploads are persisted
    pub upload_dir: PathBuf,
    /// Model used for chat generation
    pub generation_model: String,
    /// Model used for embeddings
    pub embedding_model: String,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid chunk size: {0} (cannot be zero)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            ollama_url: Url::parse(DEFAULT_OLLAMA_BASE_URL)
                .unwrap_or_else(|_| unreachable!("default URL is valid")),
            vector_db_dir: PathBuf::from(DEFAULT_VECTOR_DB_DIR),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Config {
    /// Resolve configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    #[inline]
    pub fn from_env() -> Result<Self> {
        let ollama_raw =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_string());
        let ollama_url = Url::parse(&ollama_raw)
            .map_err(|_| ConfigError::InvalidUrl(ollama_raw))
            .context("Failed to parse OLLAMA_BASE_URL")?;

        let config = Self {
            ollama_url,
            vector_db_dir: env::var("VECTOR_DB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_VECTOR_DB_DIR)),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            generation_model: env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            chunking: ChunkingConfig::default(),
        };

        config
            .validate()
            .context("Configuration validation failed")?;

        debug!(
            "Resolved configuration: ollama={}, vector_db={:?}, uploads={:?}",
            config.ollama_url, config.vector_db_dir, config.upload_dir
        );

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }
        Ok(())
    }

    /// Create the upload and vector-store directories if they do not exist.
    #[inline]
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory: {}",
                self.upload_dir.display()
            )
        })?;
        fs::create_dir_all(&self.vector_db_dir).with_context(|| {
            format!(
                "Failed to create vector store directory: {}",
                self.vector_db_dir.display()
            )
        })?;
        Ok(())
    }
}
