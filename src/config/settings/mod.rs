#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::database::Distance;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

pub const QDRANT_URL_VAR: &str = "QDRANT_URL";
pub const QDRANT_API_KEY_VAR: &str = "QDRANT_API_KEY";
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const OLLAMA_HOST_VAR: &str = "OLLAMA_HOST";
pub const DOCS_PATH_VAR: &str = "API_DOCS_PATH";

/// Dotenv file read from the working directory by [`Config::load_default`]
pub const ENV_FILE_NAME: &str = ".env";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the vector database.
///
/// An `http(s)://` URL points at a Qdrant server and needs an API key; a
/// `file://` URL selects the embedded LanceDB store at that path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorDbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub collection: String,
    pub distance: Distance,
    pub upload_batch_size: u32,
    pub timeout_seconds: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: "api_docs".to_string(),
            distance: Distance::Cosine,
            upload_batch_size: 64,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of hits requested from the index; only the best one is used
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { limit: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocumentsConfig {
    pub path: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("scraped_docs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Delay between words of the typing effect, 0 prints replies at once
    pub typing_delay_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: 50,
        }
    }
}

/// Where the vector index lives, derived from [`VectorDbConfig::url`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorBackend {
    Qdrant(Url),
    Lance(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid vector database URL scheme: {0} (must be 'http', 'https' or 'file')")]
    InvalidVectorDbScheme(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid retrieval limit: {0} (must be between 1 and 100)")]
    InvalidRetrievalLimit(usize),
    #[error("Invalid timeout: {0} seconds (must be between 1 and 600)")]
    InvalidTimeout(u64),
    #[error("Invalid typing delay: {0} ms (must be at most 1000)")]
    InvalidTypingDelay(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `<config dir>/api-docs-chat`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("api-docs-chat"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when the
    /// file does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the default directory and apply overrides from the
    /// environment and a `.env` file in the working directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::default_dir()?;
        let mut config = Self::load(dir)?;
        let env_file = read_env_file(Path::new(ENV_FILE_NAME))?;
        // Process environment wins over the .env file
        config.apply_env_overrides(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| env_file.get(name).cloned())
        });
        config
            .validate()
            .context("Configuration validation failed after environment overrides")?;
        Ok(config)
    }

    /// Overlay credentials and endpoints from the environment.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; blank values are ignored.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = read(QDRANT_URL_VAR) {
            self.vector_db.url = Some(url);
        }
        if let Some(key) = read(QDRANT_API_KEY_VAR) {
            self.vector_db.api_key = Some(key);
        }
        if let Some(key) = read(GEMINI_API_KEY_VAR) {
            self.llm.api_key = Some(key);
        }
        if let Some(host) = read(OLLAMA_HOST_VAR) {
            self.ollama.host = host;
        }
        if let Some(path) = read(DOCS_PATH_VAR) {
            self.documents.path = PathBuf::from(path);
        }
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.vector_db.validate()?;
        self.llm.validate()?;

        if !(1..=100).contains(&self.retrieval.limit) {
            return Err(ConfigError::InvalidRetrievalLimit(self.retrieval.limit));
        }

        if self.chat.typing_delay_ms > 1000 {
            return Err(ConfigError::InvalidTypingDelay(self.chat.typing_delay_ms));
        }

        Ok(())
    }

    /// Names of the required variables that are not set.
    ///
    /// The vector database key is only required for a remote (http/https) URL.
    #[inline]
    pub fn missing_credentials(&self) -> Vec<String> {
        let mut missing = Vec::new();

        let url = self
            .vector_db
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty());
        let is_local = url.is_some_and(|url| url.starts_with("file://"));

        if url.is_none() {
            missing.push(QDRANT_URL_VAR.to_string());
        }
        if !is_local && is_blank(self.vector_db.api_key.as_deref()) {
            missing.push(QDRANT_API_KEY_VAR.to_string());
        }
        if is_blank(self.llm.api_key.as_deref()) {
            missing.push(GEMINI_API_KEY_VAR.to_string());
        }

        missing
    }

    /// Fail with every missing variable named, before any network access
    #[inline]
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let missing = self.missing_credentials();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }

    #[inline]
    pub fn vector_backend(&self) -> Result<VectorBackend, ConfigError> {
        let raw = self
            .vector_db
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredentials(vec![QDRANT_URL_VAR.to_string()]))?;
        let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;

        match url.scheme() {
            "http" | "https" => Ok(VectorBackend::Qdrant(url)),
            "file" => url
                .to_file_path()
                .map(VectorBackend::Lance)
                .map_err(|()| ConfigError::InvalidUrl(raw.to_string())),
            other => Err(ConfigError::InvalidVectorDbScheme(other.to_string())),
        }
    }
}

/// Variables defined in a dotenv file; a missing file yields none
#[inline]
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let mut vars = HashMap::new();
    for item in dotenv::from_path_iter(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
    {
        let (key, value) =
            item.with_context(|| format!("Failed to parse {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if (1..=600).contains(&seconds) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimeout(seconds))
    }
}

impl VectorDbConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(raw) = self.url.as_deref() {
            let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
            if !matches!(url.scheme(), "http" | "https" | "file") {
                return Err(ConfigError::InvalidVectorDbScheme(url.scheme().to_string()));
            }
        }

        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        if self.upload_batch_size == 0 || self.upload_batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.upload_batch_size));
        }

        validate_timeout(self.timeout_seconds)
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        validate_timeout(self.timeout_seconds)
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        validate_timeout(self.timeout_seconds)
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(8..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}
