use super::*;
use serial_test::serial;

const ENV_VARS: [&str; 5] = [
    "OLLAMA_BASE_URL",
    "VECTOR_DB_DIR",
    "UPLOAD_DIR",
    "GENERATION_MODEL",
    "EMBEDDING_MODEL",
];

fn clear_env() {
    for var in ENV_VARS {
        // SAFETY: tests mutating the environment are serialized
        unsafe { env::remove_var(var) };
    }
}

#[test]
#[serial]
fn defaults_when_env_unset() {
    clear_env();

    let config = Config::from_env().expect("should resolve defaults");

    assert_eq!(config.ollama_url.as_str(), "http://ollama:11434/");
    assert_eq!(config.vector_db_dir, PathBuf::from(DEFAULT_VECTOR_DB_DIR));
    assert_eq!(config.upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
    assert_eq!(config.generation_model, DEFAULT_GENERATION_MODEL);
    assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
}

#[test]
#[serial]
fn env_overrides_are_respected() {
    clear_env();
    // SAFETY: tests mutating the environment are serialized
    unsafe {
        env::set_var("OLLAMA_BASE_URL", "http://localhost:11434");
        env::set_var("VECTOR_DB_DIR", "/tmp/vectors");
        env::set_var("UPLOAD_DIR", "/tmp/uploads");
        env::set_var("GENERATION_MODEL", "llama3:8b");
        env::set_var("EMBEDDING_MODEL", "nomic-embed-text");
    }

    let config = Config::from_env().expect("should resolve overrides");
    clear_env();

    assert_eq!(config.ollama_url.host_str(), Some("localhost"));
    assert_eq!(config.vector_db_dir, PathBuf::from("/tmp/vectors"));
    assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
    assert_eq!(config.generation_model, "llama3:8b");
    assert_eq!(config.embedding_model, "nomic-embed-text");
}

#[test]
#[serial]
fn invalid_url_is_rejected() {
    clear_env();
    // SAFETY: tests mutating the environment are serialized
    unsafe { env::set_var("OLLAMA_BASE_URL", "not a url") };

    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
fn validate_rejects_empty_model() {
    let config = Config {
        generation_model: String::new(),
        ..Config::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn validate_rejects_oversized_overlap() {
    let config = Config {
        chunking: ChunkingConfig {
            chunk_size: 100,
            overlap: 100,
        },
        ..Config::default()
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
}

#[test]
fn ensure_directories_creates_both() {
    let temp_dir = tempfile::TempDir::new().expect("should create temp dir");
    let config = Config {
        vector_db_dir: temp_dir.path().join("vectors"),
        upload_dir: temp_dir.path().join("uploads"),
        ..Config::default()
    };

    config
        .ensure_directories()
        .expect("should create directories");

    assert!(config.vector_db_dir.is_dir());
    assert!(config.upload_dir.is_dir());
}
