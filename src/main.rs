use anyhow::Result;
use api_docs_chat::commands::{ask, index_documents, scrape, show_status, start_chat};
use api_docs_chat::config::{run_interactive_config, show_config};
use api_docs_chat::scrape::{DEFAULT_CONTAINER_SELECTOR, FetchMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "api-docs-chat")]
#[command(about = "Ask questions about an API's documentation, answered from its scraped pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the vector database, Ollama and Gemini settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed and upload the documentation files if the collection is new
    Index {
        /// File or directory to index instead of the configured one
        #[arg(long)]
        docs: Option<PathBuf>,
    },
    /// Answer a single question and exit
    Ask {
        /// The question to answer
        query: String,
    },
    /// Start an interactive chat session
    Chat,
    /// Show configuration and service health
    Status,
    /// Save the <h3> sections of a documentation page as text files
    Scrape {
        /// Page to fetch
        url: String,
        /// CSS selector of the element holding the page content
        #[arg(long, default_value = DEFAULT_CONTAINER_SELECTOR)]
        selector: String,
        /// Output directory, defaults to the configured documents path
        #[arg(long)]
        out: Option<PathBuf>,
        /// Fetch the served HTML instead of rendering it in headless Chrome
        #[arg(long = "static")]
        static_html: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { docs } => {
            index_documents(docs).await?;
        }
        Commands::Ask { query } => {
            ask(&query).await?;
        }
        Commands::Chat => {
            start_chat().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Scrape {
            url,
            selector,
            out,
            static_html,
        } => {
            let mode = if static_html {
                FetchMode::Static
            } else {
                FetchMode::Rendered
            };
            scrape(&url, &selector, out, mode)?;
        }
    }

    Ok(())
}
