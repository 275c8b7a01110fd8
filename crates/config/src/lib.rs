//! Configuration management for hedera-agent
//!
//! Loads the JSON config file, layers environment overrides on top and
//! resolves which language-model backend is active.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE FAILED: {0}")]
    Json(#[from] serde_json::Error),

    #[error("INVALID CONFIG VALUE: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Language-model providers that can back the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Groq,
}

impl ProviderKind {
    /// Fallback order used when no provider is named explicitly
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
        }
    }

    /// Environment variable carrying this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            other => Err(ConfigError::Invalid(format!("unknown provider '{}'", other))),
        }
    }
}

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Backend configuration: an optional explicit provider plus per-provider settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
}

impl BackendConfig {
    pub fn provider(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Groq => &self.groq,
        }
    }

    pub fn provider_mut(&mut self, kind: ProviderKind) -> &mut ProviderConfig {
        match kind {
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Groq => &mut self.groq,
        }
    }
}

/// The single backend chosen at startup
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSelection {
    pub kind: ProviderKind,
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
}

/// Hedera network the ledger client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Previewnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Previewnet => "previewnet",
        }
    }

    /// Public mirror node REST endpoint
    pub fn mirror_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mainnet-public.mirrornode.hedera.com",
            Network::Testnet => "https://testnet.mirrornode.hedera.com",
            Network::Previewnet => "https://previewnet.mirrornode.hedera.com",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "previewnet" => Ok(Network::Previewnet),
            other => Err(ConfigError::Invalid(format!("unknown network '{}'", other))),
        }
    }
}

/// Ledger session settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
}

impl LedgerConfig {
    /// Operator account, if one is configured
    pub fn operator_id(&self) -> Option<&str> {
        let id = self.account_id.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Mirror node base URL, explicit override first
    pub fn mirror_url(&self) -> String {
        self.mirror_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.network.mirror_url().to_string())
    }
}

/// Agent loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_protocol_retries")]
    pub max_protocol_retries: u32,
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_iterations: default_max_iterations(),
            max_protocol_retries: default_max_protocol_retries(),
            model_timeout_secs: default_model_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_system_prompt() -> String {
    "You are a helpful assistant".to_string()
}

fn default_max_iterations() -> u32 {
    15
}

fn default_max_protocol_retries() -> u32 {
    3
}

fn default_model_timeout_secs() -> u64 {
    60
}

fn default_operation_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub async fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ NO CONFIG AT {:?}, USING DEFAULTS", path);
            return Ok(Config::default());
        }

        debug!("◆ READING CONFIG FROM {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ WRITING CONFIG TO {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("AGENT_PROVIDER") {
            self.backend.provider = Some(provider);
        }
        for kind in ProviderKind::ALL {
            if let Some(key) = get(kind.api_key_env()) {
                self.backend.provider_mut(kind).api_key = key;
            }
        }
        if let Some(model) = get("AGENT_MODEL") {
            match self.explicit_provider() {
                Ok(Some(kind)) => self.backend.provider_mut(kind).model = Some(model),
                _ => {
                    for kind in ProviderKind::ALL {
                        self.backend.provider_mut(kind).model = Some(model.clone());
                    }
                }
            }
        }
        if let Some(network) = get("HEDERA_NETWORK") {
            match network.parse() {
                Ok(network) => self.ledger.network = network,
                Err(e) => warn!("◆ IGNORING HEDERA_NETWORK: {}", e),
            }
        }
        if let Some(account_id) = get("HEDERA_ACCOUNT_ID") {
            self.ledger.account_id = account_id;
        }
        if let Some(private_key) = get("HEDERA_PRIVATE_KEY") {
            self.ledger.private_key = private_key;
        }
        if let Some(url) = get("HEDERA_MIRROR_URL") {
            self.ledger.mirror_url = Some(url);
        }
    }

    fn explicit_provider(&self) -> Result<Option<ProviderKind>> {
        match self.backend.provider.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name.parse().map(Some),
        }
    }

    /// Resolve the active backend.
    ///
    /// An explicitly named provider wins and must carry a key; otherwise the
    /// first provider in [`ProviderKind::ALL`] with a key is chosen.
    /// `Ok(None)` means nothing usable is configured.
    pub fn select_backend(&self) -> Result<Option<BackendSelection>> {
        let candidates: Vec<ProviderKind> = match self.explicit_provider()? {
            Some(kind) => vec![kind],
            None => ProviderKind::ALL.to_vec(),
        };

        Ok(candidates.into_iter().find_map(|kind| {
            let provider = self.backend.provider(kind);
            if provider.api_key.trim().is_empty() {
                return None;
            }
            Some(BackendSelection {
                kind,
                api_key: provider.api_key.clone(),
                api_base: provider.api_base.clone().filter(|b| !b.is_empty()),
                model: provider
                    .model
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| kind.default_model().to_string()),
            })
        }))
    }

    /// Whether any backend key is available
    pub fn has_backend(&self) -> bool {
        matches!(self.select_backend(), Ok(Some(_)))
    }
}

/// Write a default config if none exists, then load it
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("◆ CONFIG ALREADY PRESENT AT {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ CONFIG WRITTEN TO {:?}", config_path);
    }

    Config::load().await
}
