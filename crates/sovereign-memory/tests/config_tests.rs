use sovereign_memory::config::{DEFAULT_BATCH_WINDOW, DEFAULT_TOP_K};
use sovereign_memory::Config;
use std::path::PathBuf;

#[test]
fn test_config_to_toml_omits_api_key() {
    let mut config = Config::default();
    config.llm.api_key = Some("secret".to_string());

    let toml_str = toml::to_string_pretty(&config).unwrap();
    assert!(toml_str.contains("[ingest]"));
    assert!(!toml_str.contains("secret"));
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[embedding]
dimension = 768

[retrieval]
max_chars = 1500

[storage]
data_dir = ".custom-sovereign"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.retrieval.max_chars, 1500);
    assert_eq!(config.retrieval.top_k, DEFAULT_TOP_K);
    assert_eq!(config.ingest.batch_window, DEFAULT_BATCH_WINDOW);
    assert_eq!(
        config.storage.db_path(),
        PathBuf::from(".custom-sovereign").join("memory.db")
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_batch_window() {
    let mut config = Config::default();
    config.ingest.batch_window = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("sovereign.toml");
    std::fs::write(&path, "[llm]\nprovider = \"ollama\"\n").unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.llm.provider, "ollama");

    std::fs::write(&path, "[embedding]\ndimension = 0\n").unwrap();
    assert!(Config::from_file(&path).is_err());
}
