use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::chat::run_chat;
use crate::chatbot::{ApiChatbot, CollectionSettings};
use crate::config::Config;
use crate::config::settings::GEMINI_API_KEY_VAR;
use crate::database::open_index;
use crate::documents::load_documents;
use crate::embeddings::OllamaClient;
use crate::indexer::{BootstrapOutcome, ensure_indexed};
use crate::scrape::{FetchMode, scrape_page};

fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

async fn start_chatbot(config: &Config) -> Result<ApiChatbot> {
    ApiChatbot::new(config)
        .await
        .context("Failed to initialize chatbot. Check your environment variables and credentials")
}

/// Load the documentation directory and index it if the collection is new
#[inline]
pub async fn index_documents(docs: Option<PathBuf>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(docs) = docs {
        config.documents.path = docs;
    }

    // Indexing never talks to the language model
    let missing: Vec<String> = config
        .missing_credentials()
        .into_iter()
        .filter(|name| name != GEMINI_API_KEY_VAR)
        .collect();
    if !missing.is_empty() {
        bail!("Missing required configuration: {}", missing.join(", "));
    }

    let documents = load_documents(&config.documents.path).with_context(|| {
        format!(
            "Failed to read documents from {}",
            config.documents.path.display()
        )
    })?;
    println!(
        "Loaded {} documents from {}",
        documents.len(),
        config.documents.path.display()
    );

    let embedder = OllamaClient::new(&config.ollama)?;
    let index = open_index(&config).await?;
    let settings = CollectionSettings::from_config(&config);

    let outcome = ensure_indexed(
        index.as_ref(),
        &embedder,
        &settings.name,
        settings.distance,
        &documents,
    )
    .await
    .context("Indexing failed")?;

    match outcome {
        BootstrapOutcome::AlreadyIndexed => {
            println!(
                "Collection '{}' already exists; nothing to do.",
                settings.name
            );
        }
        BootstrapOutcome::Indexed { points } => {
            println!("Indexed {} documents into '{}'.", points, settings.name);
        }
    }

    Ok(())
}

/// Answer a single question and print the reply
#[inline]
pub async fn ask(query: &str) -> Result<()> {
    let config = load_config()?;
    let chatbot = start_chatbot(&config).await?;

    info!("Answering one-off query");
    println!("{}", chatbot.call_llm(query).await);
    Ok(())
}

/// Start the interactive chat loop
#[inline]
pub async fn start_chat() -> Result<()> {
    let config = load_config()?;
    let chatbot = start_chatbot(&config).await?;
    run_chat(&chatbot, &config.chat).await
}

/// Fetch a documentation page and save its sections as text files
#[inline]
pub fn scrape(url: &str, selector: &str, out: Option<PathBuf>, mode: FetchMode) -> Result<()> {
    let out = match out {
        Some(out) => out,
        None => load_config()
            .map(|config| config.documents.path)
            .unwrap_or_else(|_| PathBuf::from("scraped_docs")),
    };

    let written = scrape_page(url, selector, &out, mode)
        .with_context(|| format!("Failed to scrape {}", url))?;

    println!("Saved {} sections to {}", written.len(), out.display());
    for path in &written {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Report configuration and the reachability of every backing service
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default().unwrap_or_default();

    println!("📊 API Docs Chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔑 Credentials:");
    let missing = config.missing_credentials();
    if missing.is_empty() {
        println!("   ✅ All required variables are set");
    } else {
        println!("   ❌ Missing: {}", missing.join(", "));
    }

    println!();
    println!("📁 Documents:");
    print_documents_status(&config.documents.path);

    println!();
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", client.model());
                println!(
                    "   🔢 Dimension: {}",
                    config.ollama.embedding_dimension
                );
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!();
    println!("🔍 Vector Database Status:");
    if config.vector_db.url.is_none() {
        println!("   ❌ No vector database URL configured");
    } else {
        match open_index(&config).await {
            Ok(index) => {
                let collection = &config.vector_db.collection;
                match index.collection_exists(collection).await {
                    Ok(true) => match index.count_points(collection).await {
                        Ok(count) => {
                            println!("   ✅ Collection '{}': {} points", collection, count);
                        }
                        Err(e) => {
                            println!("   ⚠️  Collection '{}': count failed - {}", collection, e);
                        }
                    },
                    Ok(false) => {
                        println!(
                            "   💤 Collection '{}' not created yet; run 'api-docs-chat index'",
                            collection
                        );
                    }
                    Err(e) => {
                        error!("Vector database check failed: {}", e);
                        println!("   ❌ Vector database unreachable - {}", e);
                    }
                }
            }
            Err(e) => {
                println!("   ❌ Vector database: Failed to open - {}", e);
            }
        }
    }

    println!();
    println!("💬 Language Model:");
    println!("   📋 Model: {}", config.llm.model);
    if config
        .llm
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty())
    {
        println!("   ✅ API key configured");
    } else {
        println!("   ❌ {} is not set", GEMINI_API_KEY_VAR);
    }

    Ok(())
}

fn print_documents_status(path: &Path) {
    match load_documents(path) {
        Ok(documents) => {
            println!(
                "   ✅ {} documents in {}",
                documents.len(),
                path.display()
            );
        }
        Err(e) => {
            println!("   ❌ Cannot read {} - {}", path.display(), e);
        }
    }
}
