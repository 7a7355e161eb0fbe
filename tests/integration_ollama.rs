#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance with all-minilm pulled
// Run with: cargo test --test integration_ollama -- --ignored

use api_docs_chat::config::OllamaConfig;
use api_docs_chat::database::Distance;
use api_docs_chat::embeddings::{Embedder, OllamaClient};
use std::env;
use std::time::Duration;
use tracing::info;

fn create_integration_test_client() -> OllamaClient {
    let mut config = OllamaConfig::default();
    if let Ok(host) = env::var("OLLAMA_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    config.batch_size = 2; // Force several requests per batch

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_embedding_has_model_dimension() {
    init_test_tracing();

    let client = create_integration_test_client();
    let embedding = client
        .embed("Endpoint: POST /v2/people-search requires title and location.")
        .expect("should embed");

    info!("Embedding has {} dimensions", embedding.len());
    assert_eq!(embedding.len(), client.dimension());
    assert!(embedding.iter().all(|value| value.is_finite()));
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_batch_preserves_order() {
    init_test_tracing();

    let client = create_integration_test_client();
    let texts = vec![
        "Search people by title and location".to_string(),
        "Enrich a company from its domain".to_string(),
        "Authenticate with a bearer token".to_string(),
    ];

    let batch = client.embed_batch(&texts).expect("should embed batch");
    assert_eq!(batch.len(), texts.len());

    for (text, vector) in texts.iter().zip(&batch) {
        let single = client.embed(text).expect("should embed single");
        let similarity = Distance::Cosine.similarity(&single, vector);
        assert!(
            similarity > 0.99,
            "batch and single embeddings differ for {text:?}: {similarity}"
        );
    }
}

#[test]
#[ignore = "requires a running Ollama instance"]
fn real_ollama_related_texts_score_higher() {
    init_test_tracing();

    let client = create_integration_test_client();
    let query = client
        .embed("API endpoint that finds people based on their job and location")
        .expect("should embed query");
    let people = client
        .embed("Endpoint: POST /v2/people-search requires title and location.")
        .expect("should embed people doc");
    let company = client
        .embed("Webhook retries are sent with exponential backoff.")
        .expect("should embed unrelated doc");

    assert!(
        Distance::Cosine.similarity(&query, &people)
            > Distance::Cosine.similarity(&query, &company)
    );
}
