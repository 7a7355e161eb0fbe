// Chatbot module
// Owns the clients and the indexed collection, and chains rewrite, retrieval
// and generation for each question


use tracing::{error, info, warn};

use crate::Result;
use crate::config::Config;
use crate::database::{self, Distance, VectorIndex};
use crate::documents::{self, Document};
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{self, BootstrapOutcome};
use crate::llm::{GeminiClient, LanguageModel};
use crate::retrieval;

/// Reply given by [`ApiChatbot::call_llm`] whenever answering fails
pub const GENERIC_APOLOGY: &str =
    "Sorry, I couldn't answer that right now. Please try again in a moment.";

/// Retrieval-augmented chatbot over one collection of API documentation
pub struct ApiChatbot {
    embedder: Box<dyn Embedder>,
    index: Box<dyn VectorIndex>,
    llm: Box<dyn LanguageModel>,
    collection: String,
    limit: usize,
    documents: Vec<Document>,
    bootstrap: BootstrapOutcome,
}

/// Collection settings used by [`ApiChatbot::from_components`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSettings {
    pub name: String,
    pub distance: Distance,
    /// Neighbours requested per query; only the best is used
    pub limit: usize,
}

impl Default for CollectionSettings {
    #[inline]
    fn default() -> Self {
        Self {
            name: "api_docs".to_string(),
            distance: Distance::Cosine,
            limit: retrieval::DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl CollectionSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.vector_db.collection.clone(),
            distance: config.vector_db.distance,
            limit: config.retrieval.limit,
        }
    }
}

impl ApiChatbot {
    /// Build the production chatbot: Ollama embeddings, the configured vector
    /// database and Gemini.
    ///
    /// Credentials are checked before anything touches the network, so a
    /// missing key fails with every absent variable named. Documents are then
    /// loaded from `config.documents.path` and indexed if the collection does
    /// not exist yet.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        config.require_credentials()?;
        config.validate()?;

        let embedder = OllamaClient::new(&config.ollama)?;
        let index = database::open_index(config).await?;
        let llm = GeminiClient::new(&config.llm)?;

        let documents = documents::load_documents(&config.documents.path)?;

        Self::from_components(
            Box::new(embedder),
            index,
            Box::new(llm),
            CollectionSettings::from_config(config),
            documents,
        )
        .await
    }

    /// Assemble a chatbot from already constructed parts and make sure the
    /// collection is populated with `documents`
    #[inline]
    pub async fn from_components(
        embedder: Box<dyn Embedder>,
        index: Box<dyn VectorIndex>,
        llm: Box<dyn LanguageModel>,
        settings: CollectionSettings,
        documents: Vec<Document>,
    ) -> Result<Self> {
        let bootstrap = indexer::ensure_indexed(
            index.as_ref(),
            embedder.as_ref(),
            &settings.name,
            settings.distance,
            &documents,
        )
        .await?;

        info!(
            "Chatbot ready on collection {} ({} documents loaded)",
            settings.name,
            documents.len()
        );

        Ok(Self {
            embedder,
            index,
            llm,
            collection: settings.name,
            limit: settings.limit.max(1),
            documents,
            bootstrap,
        })
    }

    /// Documents loaded at startup, in id order
    #[inline]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Whether startup created the collection or found it in place
    #[inline]
    pub fn bootstrap(&self) -> BootstrapOutcome {
        self.bootstrap
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Answer `query` from the documentation.
    ///
    /// A failed rewrite falls back to the raw query and a failed lookup
    /// answers without context; only generation errors are returned.
    #[inline]
    pub async fn answer(&self, query: &str) -> Result<String> {
        let rewritten = retrieval::rewrite_query(self.llm.as_ref(), query);

        let context = match retrieval::select_context(
            self.embedder.as_ref(),
            self.index.as_ref(),
            &self.collection,
            &rewritten,
            self.limit,
        )
        .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    "Context lookup failed ({:?}), answering without context: {}",
                    e.kind(),
                    e
                );
                String::new()
            }
        };

        retrieval::generate_answer(self.llm.as_ref(), query, &rewritten, &context)
    }

    /// Like [`answer`](Self::answer), but any failure becomes
    /// [`GENERIC_APOLOGY`] after being logged with its kind
    #[inline]
    pub async fn call_llm(&self, query: &str) -> String {
        match self.answer(query).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Failed to answer query ({:?}): {}", e.kind(), e);
                GENERIC_APOLOGY.to_string()
            }
        }
    }
}
