use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "all-minilm");
    assert_eq!(config.ollama.embedding_dimension, 384);
    assert_eq!(config.vector_db.distance, Distance::Cosine);
    assert_eq!(config.llm.model, "gemini-1.5-flash");
    assert_eq!(config.retrieval.limit, 3);
    assert_eq!(config.chat.typing_delay_ms, 50);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.vector_db.collection = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidCollection(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.vector_db.url = Some("ftp://vectors.example.com".to_string());
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidVectorDbScheme(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.limit = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidRetrievalLimit(0))
    ));

    let mut invalid_config = config;
    invalid_config.llm.timeout_seconds = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.vector_db.url = Some("https://qdrant.example.com:6333".to_string());
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_config_uses_defaults() {
    let partial_toml = r#"
        [ollama]
        host = "embedder.internal"

        [retrieval]
        limit = 5
    "#;

    let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
    assert_eq!(config.ollama.host, "embedder.internal");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.retrieval.limit, 5);
    assert_eq!(config.vector_db.collection, "api_docs");
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_embedding_dimension(768).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model("   ".to_string()).is_err());
    assert!(config.set_embedding_dimension(0).is_err());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.vector_db.collection = "crustdata".to_string();
    config.chat.typing_delay_ms = 0;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nlimit = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn env_overrides_fill_credentials() {
    let mut config = Config::default();
    config.apply_env_overrides(env_from(&[
        (QDRANT_URL_VAR, "https://cluster.qdrant.io:6333"),
        (QDRANT_API_KEY_VAR, "qdrant-secret"),
        (GEMINI_API_KEY_VAR, "gemini-secret"),
        (OLLAMA_HOST_VAR, "gpu-box"),
        (DOCS_PATH_VAR, "/srv/docs"),
    ]));

    assert_eq!(
        config.vector_db.url.as_deref(),
        Some("https://cluster.qdrant.io:6333")
    );
    assert_eq!(config.vector_db.api_key.as_deref(), Some("qdrant-secret"));
    assert_eq!(config.llm.api_key.as_deref(), Some("gemini-secret"));
    assert_eq!(config.ollama.host, "gpu-box");
    assert_eq!(config.documents.path, PathBuf::from("/srv/docs"));
    assert!(config.require_credentials().is_ok());
}

#[test]
fn blank_env_values_are_ignored() {
    let mut config = Config::default();
    config.llm.api_key = Some("from-file".to_string());
    config.apply_env_overrides(env_from(&[(GEMINI_API_KEY_VAR, "   ")]));
    assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
}

#[test]
fn missing_credentials_are_all_named() {
    let config = Config::default();
    let error = config
        .require_credentials()
        .expect_err("defaults carry no credentials");

    match error {
        ConfigError::MissingCredentials(missing) => assert_eq!(
            missing,
            vec![QDRANT_URL_VAR, QDRANT_API_KEY_VAR, GEMINI_API_KEY_VAR]
        ),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn local_vector_store_needs_no_api_key() {
    let mut config = Config::default();
    config.vector_db.url = Some("file:///var/lib/api-docs-chat/vectors".to_string());
    config.llm.api_key = Some("gemini-secret".to_string());

    assert!(config.missing_credentials().is_empty());
    assert_eq!(
        config.vector_backend().expect("file url is valid"),
        VectorBackend::Lance(PathBuf::from("/var/lib/api-docs-chat/vectors"))
    );
}

#[test]
fn remote_vector_backend() {
    let mut config = Config::default();
    config.vector_db.url = Some("http://localhost:6333".to_string());

    match config.vector_backend().expect("http url is valid") {
        VectorBackend::Qdrant(url) => assert_eq!(url.as_str(), "http://localhost:6333/"),
        other => panic!("unexpected backend: {other:?}"),
    }
}

#[test]
fn error_display_messages() {
    let errors = vec![
        ConfigError::InvalidProtocol("ftp".to_string()),
        ConfigError::InvalidPort(0),
        ConfigError::InvalidBatchSize(0),
        ConfigError::InvalidModel(String::new()),
        ConfigError::InvalidUrl("invalid-url".to_string()),
        ConfigError::MissingCredentials(vec![GEMINI_API_KEY_VAR.to_string()]),
    ];

    for error in errors {
        let message = format!("{error}");
        assert!(message.len() > 10);
    }
}

#[test]
fn env_file_values_are_read() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join(ENV_FILE_NAME);
    fs::write(
        &path,
        "# credentials\nGEMINI_API_KEY=from-file\nQDRANT_URL=\"http://qdrant.local:6333\"\n",
    )
    .expect("should write env file");

    let vars = read_env_file(&path).expect("should parse env file");
    assert_eq!(vars.get(GEMINI_API_KEY_VAR).map(String::as_str), Some("from-file"));
    assert_eq!(
        vars.get(QDRANT_URL_VAR).map(String::as_str),
        Some("http://qdrant.local:6333")
    );
}

#[test]
fn missing_env_file_is_empty() {
    let temp = TempDir::new().expect("should create temp dir");
    let vars = read_env_file(&temp.path().join(ENV_FILE_NAME)).expect("missing file is fine");
    assert!(vars.is_empty());
}

#[test]
fn process_environment_wins_over_env_file() {
    let temp = TempDir::new().expect("should create temp dir");
    let path = temp.path().join(ENV_FILE_NAME);
    fs::write(&path, "GEMINI_API_KEY=from-file\nOLLAMA_HOST=file-host\n")
        .expect("should write env file");
    let file_vars = read_env_file(&path).expect("should parse env file");

    let process = env_from(&[(GEMINI_API_KEY_VAR, "from-process")]);
    let mut config = Config::default();
    config.apply_env_overrides(|name| process(name).or_else(|| file_vars.get(name).cloned()));

    assert_eq!(config.llm.api_key.as_deref(), Some("from-process"));
    assert_eq!(config.ollama.host, "file-host");
}
