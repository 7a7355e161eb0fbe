// Language model module
// Hosted text generation used for both query rewriting and answering

pub mod gemini;

pub use gemini::GeminiClient;

use crate::Result;

/// A hosted text-generation model with a single prompt-in, text-out operation
pub trait LanguageModel: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}
