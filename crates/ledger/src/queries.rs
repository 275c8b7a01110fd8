//! Read-only ledger queries, grouped into capability bundles

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::DateTime;
use hedera_agent_core::{
    CapabilityBundle, FieldKind, InputSchema, OperationDescriptor, OperationFailure,
    OperationHandler,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Number, Value};
use tracing::debug;

use crate::{EntityId, LedgerClient, LedgerError};

pub const ACCOUNT_QUERIES: &str = "core-account-queries";
pub const NETWORK_QUERIES: &str = "core-network-queries";

const DEFAULT_TOPIC_LIMIT: i64 = 10;
const MAX_TOPIC_LIMIT: i64 = 100;

/// Balance, account info and token holdings, defaulting to the operator
pub fn account_queries(client: Arc<LedgerClient>) -> CapabilityBundle {
    let account = |description: &str| {
        InputSchema::new().optional(
            "account_id",
            FieldKind::String,
            &format!("{} in shard.realm.num form; the operator account when omitted", description),
        )
    };

    CapabilityBundle::new(ACCOUNT_QUERIES)
        .with_operation(
            OperationDescriptor::new(
                "get_hbar_balance",
                "Get the HBAR balance of a Hedera account",
                account("Account to query"),
            ),
            HbarBalance {
                client: client.clone(),
            },
        )
        .with_operation(
            OperationDescriptor::new(
                "get_account_info",
                "Get details of a Hedera account: balance, key type, EVM address, memo and creation time",
                account("Account to describe"),
            ),
            AccountInfo {
                client: client.clone(),
            },
        )
        .with_operation(
            OperationDescriptor::new(
                "get_account_token_balances",
                "List the fungible and non-fungible token balances held by a Hedera account",
                account("Account to query").optional(
                    "token_id",
                    FieldKind::String,
                    "Only report this token, in shard.realm.num form",
                ),
            ),
            AccountTokenBalances { client },
        )
}

/// Token metadata, topic messages and the HBAR exchange rate
pub fn network_queries(client: Arc<LedgerClient>) -> CapabilityBundle {
    CapabilityBundle::new(NETWORK_QUERIES)
        .with_operation(
            OperationDescriptor::new(
                "get_token_info",
                "Get metadata of a Hedera token: name, symbol, type, decimals, supply and treasury",
                InputSchema::new().required(
                    "token_id",
                    FieldKind::String,
                    "Token in shard.realm.num form",
                ),
            ),
            TokenInfo {
                client: client.clone(),
            },
        )
        .with_operation(
            OperationDescriptor::new(
                "get_topic_messages",
                "Get the most recent messages submitted to a Hedera consensus topic",
                InputSchema::new()
                    .required("topic_id", FieldKind::String, "Topic in shard.realm.num form")
                    .optional(
                        "limit",
                        FieldKind::Integer,
                        "Number of messages to return, 1 to 100 (default 10)",
                    ),
            ),
            TopicMessages {
                client: client.clone(),
            },
        )
        .with_operation(
            OperationDescriptor::new(
                "get_exchange_rate",
                "Get the current and next HBAR to USD exchange rate",
                InputSchema::new(),
            ),
            ExchangeRate { client },
        )
}

#[derive(Deserialize)]
struct AccountArgs {
    account_id: Option<String>,
}

#[derive(Deserialize)]
struct AccountTokenArgs {
    account_id: Option<String>,
    token_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenArgs {
    token_id: String,
}

#[derive(Deserialize)]
struct TopicArgs {
    topic_id: String,
    limit: Option<Number>,
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, OperationFailure> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(arguments)
        .map_err(|e| OperationFailure::recoverable(format!("invalid arguments: {}", e)))
}

pub struct HbarBalance {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for HbarBalance {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let args: AccountArgs = parse_args(arguments)?;
        let account = self.client.account_or_operator(args.account_id.as_deref())?;
        debug!("HBAR balance: {}", account);

        let data = self
            .client
            .get_json("/api/v1/balances", &[("account.id", account.to_string())])
            .await?;

        let tinybars = data["balances"]
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(|row| row["balance"].as_u64())
            .ok_or_else(|| not_found("account", account))?;

        Ok(format!(
            "Account {} holds {} ℏ ({} tinybars)",
            account,
            format_hbar(tinybars),
            tinybars
        ))
    }
}

pub struct AccountInfo {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for AccountInfo {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let args: AccountArgs = parse_args(arguments)?;
        let account = self.client.account_or_operator(args.account_id.as_deref())?;
        debug!("Account info: {}", account);

        let data = self
            .client
            .get_json(&format!("/api/v1/accounts/{}", account), &[])
            .await?;

        let mut lines = vec![format!("Account {}", account)];
        if let Some(tinybars) = data["balance"]["balance"].as_u64() {
            lines.push(format!("  Balance: {} ℏ", format_hbar(tinybars)));
        }
        if let Some(evm) = data["evm_address"].as_str() {
            lines.push(format!("  EVM address: {}", evm));
        }
        if let Some(key_type) = data["key"]["_type"].as_str() {
            lines.push(format!("  Key type: {}", key_type));
        }
        if let Some(memo) = data["memo"].as_str().filter(|m| !m.is_empty()) {
            lines.push(format!("  Memo: {}", memo));
        }
        if let Some(created) = data["created_timestamp"].as_str().and_then(format_timestamp) {
            lines.push(format!("  Created: {}", created));
        }
        if data["deleted"].as_bool() == Some(true) {
            lines.push("  Deleted: yes".to_string());
        }
        Ok(lines.join("\n"))
    }
}

pub struct AccountTokenBalances {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for AccountTokenBalances {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let args: AccountTokenArgs = parse_args(arguments)?;
        let account = self.client.account_or_operator(args.account_id.as_deref())?;
        let token = match args.token_id.as_deref() {
            Some(id) => Some(id.parse::<EntityId>()?),
            None => None,
        };
        debug!("Token balances: {} (token {:?})", account, token);

        let mut query = vec![("limit", "100".to_string())];
        if let Some(token) = token {
            query.push(("token.id", token.to_string()));
        }
        let data = self
            .client
            .get_json(&format!("/api/v1/accounts/{}/tokens", account), &query)
            .await?;

        let rows = data["tokens"]
            .as_array()
            .ok_or_else(|| LedgerError::Decode("missing 'tokens'".to_string()))?;

        if rows.is_empty() {
            return Ok(match token {
                Some(token) => format!("Account {} does not hold token {}", account, token),
                None => format!("Account {} holds no tokens", account),
            });
        }

        let mut lines = vec![format!("Token balances of {}:", account)];
        for row in rows {
            let id = row["token_id"].as_str().unwrap_or("?");
            let amount = lenient_u64(&row["balance"]).unwrap_or(0);
            let decimals = decimals_of(&row["decimals"]);
            lines.push(format!("- {}: {}", id, format_units(amount, decimals)));
        }
        Ok(lines.join("\n"))
    }
}

pub struct TokenInfo {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for TokenInfo {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let args: TokenArgs = parse_args(arguments)?;
        let token: EntityId = args.token_id.parse()?;
        debug!("Token info: {}", token);

        let data = self
            .client
            .get_json(&format!("/api/v1/tokens/{}", token), &[])
            .await?;

        let decimals = decimals_of(&data["decimals"]);
        let text = |key: &str| data[key].as_str().unwrap_or("").to_string();

        let mut lines = vec![format!("Token {}", token)];
        lines.push(format!("  Name: {}", text("name")));
        lines.push(format!("  Symbol: {}", text("symbol")));
        lines.push(format!("  Type: {}", text("type")));
        lines.push(format!(
            "  Decimals: {}",
            lenient_u64(&data["decimals"]).unwrap_or(0)
        ));
        if let Some(supply) = lenient_u64(&data["total_supply"]) {
            lines.push(format!("  Total supply: {}", format_units(supply, decimals)));
        }
        match lenient_u64(&data["max_supply"]) {
            Some(max) if max > 0 => {
                lines.push(format!("  Max supply: {}", format_units(max, decimals)))
            }
            _ => lines.push(format!("  Supply type: {}", text("supply_type"))),
        }
        if let Some(treasury) = data["treasury_account_id"].as_str() {
            lines.push(format!("  Treasury: {}", treasury));
        }
        if let Some(memo) = data["memo"].as_str().filter(|m| !m.is_empty()) {
            lines.push(format!("  Memo: {}", memo));
        }
        if data["deleted"].as_bool() == Some(true) {
            lines.push("  Deleted: yes".to_string());
        }
        Ok(lines.join("\n"))
    }
}

pub struct TopicMessages {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for TopicMessages {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let args: TopicArgs = parse_args(arguments)?;
        let topic: EntityId = args.topic_id.parse()?;
        let limit = topic_limit(args.limit.as_ref());
        debug!("Topic messages: {} (limit {})", topic, limit);

        let data = self
            .client
            .get_json(
                &format!("/api/v1/topics/{}/messages", topic),
                &[("limit", limit.to_string()), ("order", "desc".to_string())],
            )
            .await?;

        let messages = data["messages"]
            .as_array()
            .ok_or_else(|| LedgerError::Decode("missing 'messages'".to_string()))?;

        if messages.is_empty() {
            return Ok(format!("Topic {} has no messages", topic));
        }

        let mut lines = vec![format!("Latest {} message(s) on topic {}:", messages.len(), topic)];
        for message in messages {
            let sequence = message["sequence_number"].as_u64().unwrap_or(0);
            let when = message["consensus_timestamp"]
                .as_str()
                .and_then(format_timestamp)
                .unwrap_or_default();
            let body = message["message"]
                .as_str()
                .map(decode_message)
                .unwrap_or_default();
            lines.push(format!("#{} [{}] {}", sequence, when, body));
        }
        Ok(lines.join("\n"))
    }
}

pub struct ExchangeRate {
    client: Arc<LedgerClient>,
}

#[async_trait]
impl OperationHandler for ExchangeRate {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        let _: Value = parse_args(arguments)?;
        debug!("Exchange rate");

        let data = self
            .client
            .get_json("/api/v1/network/exchangerate", &[])
            .await?;

        let current = describe_rate(&data["current_rate"])
            .ok_or_else(|| LedgerError::Decode("missing 'current_rate'".to_string()))?;
        let mut lines = vec![format!("Current: {}", current)];
        if let Some(next) = describe_rate(&data["next_rate"]) {
            lines.push(format!("Next: {}", next));
        }
        Ok(lines.join("\n"))
    }
}

fn describe_rate(rate: &Value) -> Option<String> {
    let cents = rate["cent_equivalent"].as_u64()?;
    let hbars = rate["hbar_equivalent"].as_u64().filter(|h| *h > 0)?;
    let usd = cents as f64 / hbars as f64 / 100.0;
    let mut text = format!("1 ℏ = ${:.6} USD", usd);
    if let Some(expires) = rate["expiration_time"]
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    {
        text.push_str(&format!(" (until {})", expires.format("%Y-%m-%d %H:%M UTC")));
    }
    Some(text)
}

fn not_found(kind: &str, id: EntityId) -> LedgerError {
    LedgerError::Status {
        status: 404,
        message: format!("{} {} not found", kind, id),
    }
}

/// Tinybars as HBAR, trailing zeros trimmed
pub fn format_hbar(tinybars: u64) -> String {
    format_units(tinybars, 8)
}

/// Smallest-unit amount as a decimal string.
///
/// Decimals too large to scale by leave the amount in smallest units.
pub fn format_units(amount: u64, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let Some(scale) = 10u128.checked_pow(decimals) else {
        return format!("{} (smallest units, {} decimals)", amount, decimals);
    };
    let whole = amount as u128 / scale;
    let fraction = amount as u128 % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Requested message count clamped to what one mirror page returns
fn topic_limit(requested: Option<&Number>) -> i64 {
    match requested {
        None => DEFAULT_TOPIC_LIMIT,
        // beyond i64 only huge positive integers remain
        Some(n) => n.as_i64().unwrap_or(MAX_TOPIC_LIMIT).clamp(1, MAX_TOPIC_LIMIT),
    }
}

/// Token decimals as reported; values beyond `u32` saturate
fn decimals_of(value: &Value) -> u32 {
    lenient_u64(value)
        .map(|d| u32::try_from(d).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Mirror node numbers sometimes arrive as strings
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `seconds.nanoseconds` consensus timestamp as UTC
fn format_timestamp(raw: &str) -> Option<String> {
    let (secs, nanos) = raw.split_once('.').unwrap_or((raw, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = nanos.parse().ok()?;
    DateTime::from_timestamp(secs, nanos).map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn decode_message(encoded: &str) -> String {
    match general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => encoded.to_string(),
    }
}
