//! Tool-calling agent core
//!
//! Operation descriptors and the registry that owns their handlers, the
//! conversation transcript, the model adapter that turns backend replies into
//! decisions, and the loop that drives decide/execute/fold until an answer.

use std::fmt;

use hedera_agent_config::ConfigError;
use hedera_agent_provider::ProviderError;
use thiserror::Error;

pub mod adapter;
pub mod context;
pub mod conversation;
pub mod loop_agent;
pub mod operation;
pub mod registry;
pub mod session;

pub use adapter::{Decision, ModelAdapter};
pub use context::ContextBuilder;
pub use conversation::{ConversationSnapshot, ConversationState};
pub use loop_agent::{AgentLoop, LoopLimits, RunOutcome};
pub use operation::{
    handler_fn, FailureKind, FieldKind, InputSchema, OperationCall, OperationDescriptor,
    OperationFailure, OperationHandler, OperationOutcome, OperationResult,
};
pub use registry::{CapabilityBundle, OperationRegistry, RegisteredOperation};
pub use session::AgentSession;

/// Which bound the loop ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Iterations,
    ProtocolRetries,
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Iterations => f.write_str("iteration"),
            Budget::ProtocolRetries => f.write_str("protocol retry"),
        }
    }
}

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ NO BACKEND CONFIGURED: set ANTHROPIC_API_KEY, OPENAI_API_KEY or GROQ_API_KEY")]
    NoBackendConfigured,

    #[error("◆ DUPLICATE OPERATION: '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("◆ UNKNOWN OPERATION: '{0}'")]
    UnknownOperation(String),

    #[error("◆ INVALID CALL REQUEST: '{}' was not offered to the backend", .0.name)]
    InvalidCallRequest(OperationCall),

    #[error("◆ INVALID ARGUMENTS FOR '{operation}': {reason}")]
    ArgumentValidation { operation: String, reason: String },

    #[error("◆ UNDECODABLE ARGUMENTS FOR '{}': {reason}", .call.name)]
    MalformedArguments { call: OperationCall, reason: String },

    #[error("◆ OPERATION '{operation}' FAILED: {reason}")]
    OperationExecution { operation: String, reason: String },

    #[error("◆ LOOP EXCEEDED: {budget} budget of {limit} spent without an answer (last: {last_state})")]
    LoopExceeded {
        budget: Budget,
        limit: u32,
        last_state: String,
    },

    #[error("◆ CANCELLED after {iterations} iteration(s)")]
    Cancelled { iterations: u32 },

    #[error("◆ BACKEND ERROR: {0}")]
    Backend(#[from] ProviderError),

    #[error("◆ CONFIG ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl AgentError {
    /// Short machine-readable kind, used when reporting fatal conditions
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::NoBackendConfigured => "no_backend_configured",
            AgentError::DuplicateOperation(_) => "duplicate_operation",
            AgentError::UnknownOperation(_) => "unknown_operation",
            AgentError::InvalidCallRequest(_) => "invalid_call_request",
            AgentError::ArgumentValidation { .. } => "argument_validation",
            AgentError::MalformedArguments { .. } => "malformed_arguments",
            AgentError::OperationExecution { .. } => "operation_execution",
            AgentError::LoopExceeded { .. } => "loop_exceeded",
            AgentError::Cancelled { .. } => "cancelled",
            AgentError::Backend(_) => "backend",
            AgentError::Config(_) => "config",
        }
    }

    /// Errors the loop folds back into the transcript instead of aborting
    pub fn is_protocol_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidCallRequest(_)
                | AgentError::ArgumentValidation { .. }
                | AgentError::MalformedArguments { .. }
                | AgentError::UnknownOperation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
