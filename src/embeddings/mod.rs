// Embeddings module
// Text to vector conversion; Ollama is the production provider

pub mod ollama;

pub use ollama::{ModelInfo, OllamaClient};

use crate::Result;

/// A fixed-dimension sentence embedding model
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
