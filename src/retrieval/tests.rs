use super::*;
use crate::ChatError;
use crate::database::{CreateOutcome, Distance, IndexedPoint, MemoryIndex, ScoredPoint};
use crate::documents::Document;
use async_trait::async_trait;
use std::sync::Mutex;

/// Replies with a canned answer and records every prompt it was given
struct ScriptedModel {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        self.reply.clone().map_err(ChatError::Llm)
    }
}

/// Maps text onto a fixed axis per keyword so tests control similarity
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(vec![
            if text.contains("people") { 1.0 } else { 0.0 },
            if text.contains("company") { 1.0 } else { 0.0 },
            0.1,
        ])
    }
}

async fn index_with(documents: &[(u64, Vec<f32>, &str)]) -> MemoryIndex {
    let index = MemoryIndex::new();
    index
        .create_collection("api_docs", 3, Distance::Cosine)
        .await
        .expect("create");
    let points = documents
        .iter()
        .map(|(id, vector, content)| IndexedPoint {
            id: *id,
            vector: vector.clone(),
            payload: Document::new(format!("{id}.txt"), *content),
        })
        .collect();
    index.upload_points("api_docs", points).await.expect("upload");
    index
}

/// Serves a fixed hit list in the given order, cut at the requested limit,
/// and records each limit it was asked for
struct FixedHits {
    hits: Vec<ScoredPoint>,
    requests: Mutex<Vec<usize>>,
}

impl FixedHits {
    fn new(hits: &[(u64, f32)]) -> Self {
        Self {
            hits: hits
                .iter()
                .map(|(id, score)| ScoredPoint {
                    id: *id,
                    score: *score,
                    payload: Document::new(format!("{id}.txt"), format!("document {id}")),
                })
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<usize> {
        self.requests.lock().expect("request log").clone()
    }
}

#[async_trait]
impl VectorIndex for FixedHits {
    async fn collection_exists(&self, _collection: &str) -> Result<bool> {
        Ok(true)
    }

    async fn create_collection(
        &self,
        _collection: &str,
        _dimension: usize,
        _distance: Distance,
    ) -> Result<CreateOutcome> {
        Ok(CreateOutcome::AlreadyExists)
    }

    async fn upload_points(&self, _collection: &str, _points: Vec<IndexedPoint>) -> Result<()> {
        Ok(())
    }

    async fn query_points(
        &self,
        _collection: &str,
        _vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.requests.lock().expect("request log").push(limit);
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn count_points(&self, _collection: &str) -> Result<u64> {
        Ok(self.hits.len() as u64)
    }

    async fn delete_collection(&self, _collection: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn rewrite_uses_trimmed_completion() {
    let llm = ScriptedModel::replying("  API endpoint to search people by title and location \n");
    let rewritten = rewrite_query(&llm, "find engineers in sf");

    assert_eq!(
        rewritten,
        "API endpoint to search people by title and location"
    );
    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("find engineers in sf"));
    assert!(prompts[0].contains("find doctors in NY"));
}

#[test]
fn rewrite_falls_back_on_failure() {
    let llm = ScriptedModel::failing("quota exceeded");
    assert_eq!(rewrite_query(&llm, "find engineers in sf"), "find engineers in sf");
}

#[test]
fn rewrite_falls_back_on_blank_completion() {
    let llm = ScriptedModel::replying("   ");
    assert_eq!(rewrite_query(&llm, "list companies"), "list companies");
}

#[test]
fn blank_query_is_passed_through_without_a_call() {
    let llm = ScriptedModel::replying("something");
    assert_eq!(rewrite_query(&llm, ""), "");
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn context_is_the_best_hit() {
    let index = index_with(&[
        (0, vec![0.0, 1.0, 0.1], "GET /v1/company"),
        (1, vec![1.0, 0.0, 0.1], "POST /v2/people-search"),
    ])
    .await;

    let context = select_context(&KeywordEmbedder, &index, "api_docs", "search people", 3)
        .await
        .expect("should select");
    assert_eq!(context, "POST /v2/people-search");
}

#[tokio::test]
async fn empty_collection_gives_empty_context() {
    let index = index_with(&[]).await;
    let context = select_context(&KeywordEmbedder, &index, "api_docs", "anything", 3)
        .await
        .expect("should select");
    assert_eq!(context, "");
}

#[tokio::test]
async fn ties_go_to_the_lowest_id() {
    let index = index_with(&[
        (5, vec![1.0, 0.0, 0.1], "later duplicate"),
        (2, vec![1.0, 0.0, 0.1], "earlier duplicate"),
    ])
    .await;

    let context = select_context(&KeywordEmbedder, &index, "api_docs", "people", 3)
        .await
        .expect("should select");
    assert_eq!(context, "earlier duplicate");
}

#[tokio::test]
async fn out_of_order_ties_go_to_the_lowest_id() {
    let index = FixedHits::new(&[(5, 0.9), (2, 0.9)]);

    let context = select_context(&KeywordEmbedder, &index, "api_docs", "people", 3)
        .await
        .expect("should select");
    assert_eq!(context, "document 2");
    assert_eq!(index.requests(), vec![3]);
}

#[tokio::test]
async fn tie_past_the_limit_widens_the_search() {
    // Backend hands out tied hits highest id first, so the lowest id sits
    // beyond the first page
    let index = FixedHits::new(&[(4, 0.7), (3, 0.7), (2, 0.7), (1, 0.7), (0, 0.7)]);

    let context = select_context(&KeywordEmbedder, &index, "api_docs", "people", 2)
        .await
        .expect("should select");
    assert_eq!(context, "document 0");
    assert_eq!(index.requests(), vec![2, 4, 8]);
}

#[tokio::test]
async fn tie_below_the_top_score_does_not_widen() {
    let index = FixedHits::new(&[(3, 0.9), (1, 0.5), (0, 0.5)]);

    let context = select_context(&KeywordEmbedder, &index, "api_docs", "people", 2)
        .await
        .expect("should select");
    assert_eq!(context, "document 3");
    assert_eq!(index.requests(), vec![2]);
}

#[tokio::test]
async fn missing_collection_is_an_error() {
    let index = MemoryIndex::new();
    let result = select_context(&KeywordEmbedder, &index, "api_docs", "people", 3).await;
    assert!(result.is_err());
}

#[test]
fn answer_prompt_carries_query_and_context() {
    let llm = ScriptedModel::replying("\nUse POST /v2/people-search.\n");
    let answer = generate_answer(
        &llm,
        "find engineers in sf",
        "API endpoint to search people",
        "Endpoint: POST /v2/people-search requires title and location.",
    )
    .expect("should answer");

    assert_eq!(answer, "Use POST /v2/people-search.");
    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("find engineers in sf"));
    assert!(prompt.contains("API endpoint to search people"));
    assert!(prompt.contains("Endpoint: POST /v2/people-search requires title and location."));
    assert!(prompt.contains("HTTP method"));
}

#[test]
fn answer_prompt_marks_missing_context() {
    let llm = ScriptedModel::replying("I could not find that.");
    generate_answer(&llm, "what is the rate limit", "rate limit", "").expect("should answer");
    assert!(llm.prompts()[0].contains("(no matching documentation found)"));
}

#[test]
fn answer_failure_is_surfaced() {
    let llm = ScriptedModel::failing("blocked");
    let error = generate_answer(&llm, "q", "q", "c").expect_err("should fail");
    assert_eq!(error.kind(), crate::ErrorKind::LanguageModel);
}
