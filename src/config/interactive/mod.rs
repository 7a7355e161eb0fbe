
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::{Config, ConfigError, OllamaConfig, get_config_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 API Docs Chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Vector Database").bold().yellow());
    eprintln!("Use an http(s):// Qdrant URL, or file:///path for a local LanceDB store.");
    eprintln!();
    configure_vector_db(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Embeddings (Ollama)").bold().yellow());
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Language Model (Gemini)").bold().yellow());
    configure_llm(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        eprintln!(
            "{} {}",
            style("⚠ Still missing:").yellow(),
            missing.join(", ")
        );
        eprintln!("Set them in the environment or in a .env-style shell profile.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Vector Database:").bold().yellow());
    eprintln!(
        "  URL: {}",
        style(config.vector_db.url.as_deref().unwrap_or("<unset>")).cyan()
    );
    eprintln!(
        "  API Key: {}",
        style(mask_secret(config.vector_db.api_key.as_deref())).cyan()
    );
    eprintln!("  Collection: {}", style(&config.vector_db.collection).cyan());
    eprintln!("  Distance: {}", style(config.vector_db.distance).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Language Model:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.llm.base_url).cyan());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(config.llm.api_key.as_deref())).cyan()
    );

    eprintln!();
    eprintln!(
        "Documents: {}",
        style(config.documents.path.display()).cyan()
    );
    eprintln!("Retrieval limit: {}", style(config.retrieval.limit).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

/// Render a secret as its last four characters, or `<unset>`
pub(crate) fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(value) if value.chars().count() <= 4 => "****".to_string(),
        Some(value) => {
            let tail: String = value
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("****{}", tail)
        }
    }
}

fn load_existing_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_vector_db(config: &mut Config) -> Result<()> {
    let url: String = Input::new()
        .with_prompt("Vector database URL")
        .default(config.vector_db.url.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.vector_db.url = Some(url).filter(|url| !url.trim().is_empty());

    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(config.vector_db.collection.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            if input.trim().is_empty() {
                Err(ConfigError::InvalidCollection(input.clone()))
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.vector_db.collection = collection;

    if config
        .vector_db
        .url
        .as_deref()
        .is_some_and(|url| !url.starts_with("file://"))
    {
        let key = Password::new()
            .with_prompt("Qdrant API key (leave empty to use QDRANT_API_KEY)")
            .allow_empty_password(true)
            .interact()?;
        if !key.trim().is_empty() {
            config.vector_db.api_key = Some(key);
        }
    }

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension (must match the model)")
        .default(ollama.embedding_dimension)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_embedding_dimension(dimension)?;

    Ok(())
}

fn configure_llm(config: &mut Config) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Gemini model")
        .default(config.llm.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.llm.model = model;

    let key = Password::new()
        .with_prompt("Gemini API key (leave empty to use GEMINI_API_KEY)")
        .allow_empty_password(true)
        .interact()?;
    if !key.trim().is_empty() {
        config.llm.api_key = Some(key);
    }

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
