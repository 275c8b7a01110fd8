//! Ledger session

use std::fmt;
use std::time::Duration;

use hedera_agent_config::{LedgerConfig, Network};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{EntityId, LedgerError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("hedera-agent/", env!("CARGO_PKG_VERSION"));

/// Pre-authenticated session against one Hedera network.
///
/// Reads go through the network's mirror node. The operator account is the
/// default subject of account queries.
pub struct LedgerClient {
    network: Network,
    operator: Option<EntityId>,
    private_key: Option<String>,
    mirror_url: String,
    http: Client,
}

impl LedgerClient {
    pub fn new(network: Network, mirror_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            network,
            operator: None,
            private_key: None,
            mirror_url: mirror_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Client for a network's public mirror node
    pub fn for_network(network: Network) -> Result<Self> {
        Self::new(network, network.mirror_url())
    }

    /// Attach the operator account and, optionally, its signing key
    pub fn with_operator(mut self, account_id: &str, private_key: Option<&str>) -> Result<Self> {
        self.operator = Some(account_id.parse()?);
        self.private_key = match private_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(normalize_key(key)?),
            None => None,
        };
        Ok(self)
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let client = Self::new(config.network, config.mirror_url())?;
        match config.operator_id() {
            Some(account) => {
                let key = Some(config.private_key.as_str());
                let client = client.with_operator(account, key)?;
                debug!(
                    "◆ LEDGER: {} as {} via {}",
                    client.network, account, client.mirror_url
                );
                Ok(client)
            }
            None => {
                debug!("◆ LEDGER: {} (no operator) via {}", client.network, client.mirror_url);
                Ok(client)
            }
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn operator(&self) -> Option<EntityId> {
        self.operator
    }

    pub fn has_signing_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn mirror_url(&self) -> &str {
        &self.mirror_url
    }

    /// Parse an explicit account id, or fall back to the operator
    pub fn account_or_operator(&self, account_id: Option<&str>) -> Result<EntityId> {
        match account_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.parse(),
            None => self.operator.ok_or(LedgerError::NoOperator),
        }
    }

    /// GET a mirror node path and decode the JSON body
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.mirror_url, path);
        trace!(url = %url, ?query, "mirror node request");

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LedgerError::Status {
                status: status.as_u16(),
                message: mirror_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

impl fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClient")
            .field("network", &self.network)
            .field("operator", &self.operator)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("mirror_url", &self.mirror_url)
            .finish()
    }
}

/// Accept raw 32-byte keys and DER-encoded keys, hex, optional `0x` prefix
fn normalize_key(key: &str) -> Result<String> {
    let hex = key.strip_prefix("0x").unwrap_or(key);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LedgerError::InvalidKey("not hex encoded".to_string()));
    }
    match hex.len() {
        64 | 96 | 100 => Ok(hex.to_ascii_lowercase()),
        n => Err(LedgerError::InvalidKey(format!(
            "expected a raw or DER-encoded key, got {} hex characters",
            n
        ))),
    }
}

/// Mirror node errors look like `{"_status":{"messages":[{"message":"..."}]}}`
fn mirror_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["_status"]["messages"][0]["message"]
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
