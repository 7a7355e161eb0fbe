use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Scraper error: {0}")]
    Scraper(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`ChatError`], for callers that render one
/// generic message but still want to log or branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    Embedding,
    LanguageModel,
    Storage,
    Scraping,
    Io,
    Other,
}

impl ChatError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::MissingCredentials(_) => ErrorKind::Configuration,
            Self::Network(_) => ErrorKind::Network,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::Llm(_) => ErrorKind::LanguageModel,
            Self::Database(_) => ErrorKind::Storage,
            Self::Scraper(_) => ErrorKind::Scraping,
            Self::Io(_) => ErrorKind::Io,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<config::ConfigError> for ChatError {
    #[inline]
    fn from(error: config::ConfigError) -> Self {
        match error {
            config::ConfigError::MissingCredentials(missing) => Self::MissingCredentials(missing),
            other => Self::Config(other.to_string()),
        }
    }
}

pub mod chat;
pub mod chatbot;
pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod retrieval;
pub mod scrape;
