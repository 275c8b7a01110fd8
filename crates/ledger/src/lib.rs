//! Hedera ledger access
//!
//! [`LedgerClient`] is the session handed to operation handlers; the query
//! bundles in [`queries`] read ledger state through the mirror node REST API.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use hedera_agent_core::OperationFailure;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;
pub mod queries;

pub use client::LedgerClient;
pub use queries::{account_queries, network_queries, ACCOUNT_QUERIES, NETWORK_QUERIES};

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("MIRROR NODE REQUEST FAILED: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("MIRROR NODE RETURNED {status}: {message}")]
    Status { status: u16, message: String },

    #[error("INVALID ENTITY ID '{0}': expected shard.realm.num")]
    InvalidEntityId(String),

    #[error("INVALID PRIVATE KEY: {0}")]
    InvalidKey(String),

    #[error("UNEXPECTED MIRROR NODE PAYLOAD: {0}")]
    Decode(String),

    #[error("NO OPERATOR ACCOUNT: pass an account id or set HEDERA_ACCOUNT_ID")]
    NoOperator,
}

impl LedgerError {
    /// Failures that retrying within the same request cannot fix
    pub fn is_fatal(&self) -> bool {
        match self {
            LedgerError::Status { status, .. } => matches!(status, 401 | 403),
            LedgerError::InvalidKey(_) => true,
            _ => false,
        }
    }
}

impl From<LedgerError> for OperationFailure {
    fn from(err: LedgerError) -> Self {
        let reason = err.to_string();
        if err.is_fatal() {
            OperationFailure::fatal(reason)
        } else {
            OperationFailure::recoverable(reason)
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Account, token or topic id in `shard.realm.num` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,19})\.(\d{1,19})\.(\d{1,19})$").expect("entity id pattern is valid")
    })
}

impl FromStr for EntityId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || LedgerError::InvalidEntityId(s.to_string());
        let caps = entity_pattern().captures(trimmed).ok_or_else(invalid)?;
        let part = |i: usize| caps[i].parse::<u64>().map_err(|_| invalid());
        Ok(Self {
            shard: part(1)?,
            realm: part(2)?,
            num: part(3)?,
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}
