
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::LanguageModel;
use crate::config::LlmConfig;
use crate::config::settings::GEMINI_API_KEY_VAR;
use crate::http::{JsonMethod, RetryingAgent};
use crate::{ChatError, Result};

/// Client for the Gemini `generateContent` REST endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    model: String,
    http: RetryingAgent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ChatError::MissingCredentials(vec![GEMINI_API_KEY_VAR.to_string()]))?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            http: RetryingAgent::new(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.http = self.http.with_backoff(backoff);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LanguageModel for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Calling {} with prompt of {} bytes",
            self.model,
            prompt.len()
        );

        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ChatError::Llm(format!("Failed to serialize request: {}", e)))?;

        let response_text = self.http.send_json(
            JsonMethod::Post,
            &self.endpoint,
            &[("x-goog-api-key", self.api_key.as_str())],
            &request_json,
        )?;

        parse_response(&response_text)
    }
}

/// Concatenate the text parts of the first candidate
fn parse_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::Llm(format!("Failed to parse response: {}", e)))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        warn!("Model returned no candidates: {}", reason);
        return Err(ChatError::Llm(format!("Prompt rejected: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(ChatError::Llm(format!(
            "Empty completion (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}
