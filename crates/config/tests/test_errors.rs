//! Config failure modes

use hedera_agent_config::{Config, ConfigError, Network, ProviderKind};
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;

async fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, content)
        .await
        .expect("Failed to write config");
    path
}

#[test]
fn test_error_messages() {
    let io = ConfigError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
    assert_eq!(io.to_string(), "CONFIG IO ERROR: denied");

    let json = ConfigError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
    assert!(json.to_string().starts_with("CONFIG PARSE FAILED"));
}

#[test]
fn test_bad_names_surface_as_invalid() {
    let provider = "mistral".parse::<ProviderKind>().unwrap_err();
    assert_eq!(
        provider.to_string(),
        "INVALID CONFIG VALUE: unknown provider 'mistral'"
    );

    let network = "moonnet".parse::<Network>().unwrap_err();
    assert!(matches!(network, ConfigError::Invalid(ref m) if m.contains("moonnet")));
}

#[test]
fn test_error_is_thread_safe() {
    fn assert_send_sync<T: Send + Sync + 'static>() {}
    assert_send_sync::<ConfigError>();
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{ \"ledger\": ").await;

    let err = Config::load_from(&path).await.unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_directory_instead_of_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from(dir.path()).await.unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json"))
        .await
        .unwrap();
    assert_eq!(config.agent.defaults.max_iterations, 15);
    assert_eq!(config.ledger.network, Network::Testnet);
}

#[tokio::test]
async fn test_unknown_network_in_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"ledger": {"network": "moonnet"}}"#).await;

    assert!(matches!(
        Config::load_from(&path).await,
        Err(ConfigError::Json(_))
    ));
}

#[tokio::test]
async fn test_unknown_explicit_provider_fails_selection() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"backend": {"provider": "mistral", "openai": {"api_key": "sk-test"}}}"#,
    )
    .await;

    let config = Config::load_from(&path).await.unwrap();
    assert!(matches!(config.select_backend(), Err(ConfigError::Invalid(_))));
    assert!(!config.has_backend());
}
