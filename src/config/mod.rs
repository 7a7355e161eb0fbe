// Configuration management module
// TOML settings file, environment overrides and the interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChatConfig, Config, ConfigError, DocumentsConfig, LlmConfig, OllamaConfig, RetrievalConfig,
    VectorBackend, VectorDbConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
