//! Tests for Config serialization, defaults, persistence and environment overrides

use hedera_agent_config::{
    AgentDefaults, BackendConfig, Config, LedgerConfig, Network, ProviderConfig, ProviderKind,
};
use serial_test::serial;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const ENV_KEYS: &[&str] = &[
    "AGENT_PROVIDER",
    "AGENT_MODEL",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "HEDERA_NETWORK",
    "HEDERA_ACCOUNT_ID",
    "HEDERA_PRIVATE_KEY",
    "HEDERA_MIRROR_URL",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    let defaults = &config.agent.defaults;
    assert_eq!(defaults.system_prompt, "You are a helpful assistant");
    assert_eq!(defaults.max_iterations, 15);
    assert_eq!(defaults.max_protocol_retries, 3);
    assert_eq!(defaults.model_timeout_secs, 60);
    assert_eq!(defaults.operation_timeout_secs, 30);
    assert_eq!(defaults.max_tokens, 4096);
    assert_eq!(defaults.temperature, 0.0);

    assert!(config.backend.provider.is_none());
    assert!(config.backend.anthropic.api_key.is_empty());
    assert!(config.backend.openai.api_key.is_empty());
    assert!(config.backend.groq.api_key.is_empty());

    assert_eq!(config.ledger.network, Network::Testnet);
    assert!(config.ledger.operator_id().is_none());
}

#[test]
fn test_partial_json_uses_field_defaults() {
    let json = r#"{
        "agent": { "defaults": { "max_iterations": 4 } },
        "backend": { "openai": { "api_key": "sk-test", "model": "gpt-4o" } }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.agent.defaults.max_iterations, 4);
    assert_eq!(config.agent.defaults.max_protocol_retries, 3);

    let selection = config.select_backend().unwrap().unwrap();
    assert_eq!(selection.kind, ProviderKind::OpenAi);
    assert_eq!(selection.model, "gpt-4o");
    assert_eq!(selection.api_base, None);
}

#[test]
fn test_empty_json_object() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.agent.defaults.max_iterations, 15);
    assert_eq!(config.ledger.network, Network::Testnet);
}

#[test]
fn test_provider_config_serialization_skips_none() {
    let provider = ProviderConfig {
        api_key: "k".to_string(),
        api_base: None,
        model: None,
    };
    let json = serde_json::to_string(&provider).unwrap();
    assert!(!json.contains("api_base"));
    assert!(!json.contains("model"));
}

#[test]
fn test_provider_lookup_by_kind() {
    let mut backend = BackendConfig::default();
    backend.provider_mut(ProviderKind::Groq).api_key = "gsk".to_string();

    assert_eq!(backend.provider(ProviderKind::Groq).api_key, "gsk");
    assert!(backend.provider(ProviderKind::OpenAi).api_key.is_empty());
}

#[test]
fn test_network_mirror_urls() {
    assert_eq!(
        Network::Mainnet.mirror_url(),
        "https://mainnet-public.mirrornode.hedera.com"
    );
    assert_eq!(
        Network::Previewnet.mirror_url(),
        "https://previewnet.mirrornode.hedera.com"
    );
    assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
}

#[test]
fn test_ledger_operator_id_trims() {
    let ledger = LedgerConfig {
        account_id: "  ".to_string(),
        ..Default::default()
    };
    assert!(ledger.operator_id().is_none());
}

#[tokio::test]
async fn test_save_and_load_roundtrip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.agent.defaults = AgentDefaults {
        max_iterations: 7,
        ..Default::default()
    };
    config.backend.anthropic.api_key = "sk-ant".to_string();
    config.ledger.account_id = "0.0.5005".to_string();

    config.save_to(&path).await.unwrap();
    assert!(path.exists());

    let loaded = Config::load_from(&path).await.unwrap();
    assert_eq!(loaded.agent.defaults.max_iterations, 7);
    assert_eq!(loaded.backend.anthropic.api_key, "sk-ant");
    assert_eq!(loaded.ledger.operator_id(), Some("0.0.5005"));
}

#[test]
#[serial]
fn test_apply_env_reads_process_environment() {
    clear_env();
    std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-env");
    std::env::set_var("HEDERA_ACCOUNT_ID", "0.0.42");

    let mut config = Config::default();
    config.apply_env();
    clear_env();

    let selection = config.select_backend().unwrap().unwrap();
    assert_eq!(selection.kind, ProviderKind::Anthropic);
    assert_eq!(selection.api_key, "sk-ant-env");
    assert_eq!(config.ledger.account_id, "0.0.42");
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "from-env");

    let mut config = Config::default();
    config.backend.openai.api_key = "from-file".to_string();
    config.apply_env();
    clear_env();

    assert_eq!(config.backend.openai.api_key, "from-env");
}

#[test]
#[serial]
fn test_no_env_leaves_config_untouched() {
    clear_env();

    let mut config = Config::default();
    config.backend.groq.api_key = "file-key".to_string();
    config.apply_env();

    assert_eq!(config.backend.groq.api_key, "file-key");
    assert!(config.backend.provider.is_none());
}
