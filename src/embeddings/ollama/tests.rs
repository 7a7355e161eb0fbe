use super::*;

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 768,
        timeout_seconds: 10,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension(), 768);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(
        client.http.retry_attempts(),
        crate::http::DEFAULT_RETRY_ATTEMPTS
    );
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.http.retry_attempts(), 5);
    assert_eq!(client.dimension(), DEFAULT_EMBEDDING_DIMENSION as usize);
}

#[test]
fn invalid_protocol_is_rejected() {
    let config = OllamaConfig {
        host: "bad host name".to_string(),
        ..OllamaConfig::default()
    };
    assert!(OllamaClient::new(&config).is_err());
}

#[test]
fn empty_batch_skips_the_network() {
    // Port 9 is discard; any request would fail, so success proves no request was made
    let config = OllamaConfig {
        port: 9,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");
    let embeddings = client.embed_batch(&[]).expect("empty batch succeeds");
    assert!(embeddings.is_empty());
}
