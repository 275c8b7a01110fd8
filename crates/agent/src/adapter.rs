//! Model adapter
//!
//! Wraps the single active backend and turns its replies into decisions.

use std::sync::Arc;

use hedera_agent_config::{BackendSelection, Config, ProviderKind};
use hedera_agent_provider::{
    AnthropicProvider, ChatParams, OpenAiProvider, Provider, ProviderError,
};
use tracing::{debug, info, warn};

use crate::conversation::ConversationSnapshot;
use crate::operation::{OperationCall, OperationDescriptor};
use crate::{AgentError, Result};

/// What the model wants next
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    FinalAnswer(String),
    CallRequest(OperationCall),
}

pub struct ModelAdapter {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ModelAdapter {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let model = model.into();
        let model = if model.is_empty() {
            provider.default_model()
        } else {
            model
        };
        Self {
            provider,
            model,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Construct the concrete backend for a startup selection
    pub fn from_selection(selection: BackendSelection) -> Self {
        let BackendSelection {
            kind,
            api_key,
            api_base,
            model,
        } = selection;

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::Anthropic => {
                Arc::new(AnthropicProvider::new(api_key, api_base, Some(model.clone())))
            }
            ProviderKind::OpenAi => {
                Arc::new(OpenAiProvider::new(api_key, api_base, Some(model.clone())))
            }
            ProviderKind::Groq => {
                Arc::new(OpenAiProvider::groq(api_key, api_base, Some(model.clone())))
            }
        };

        info!("◆ BACKEND: {} ({})", kind, model);
        Self::new(provider, model)
    }

    /// Fails with [`AgentError::NoBackendConfigured`] when nothing usable is set
    pub fn from_config(config: &Config) -> Result<Self> {
        let selection = config
            .select_backend()?
            .ok_or(AgentError::NoBackendConfigured)?;
        let defaults = &config.agent.defaults;
        let adapter =
            Self::from_selection(selection).with_sampling(defaults.max_tokens, defaults.temperature);
        if !adapter.provider.is_configured() {
            return Err(AgentError::NoBackendConfigured);
        }
        Ok(adapter)
    }

    pub fn backend_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the backend for the next step.
    ///
    /// Only the first requested call is honored. A call naming an operation
    /// that was not offered here yields [`AgentError::InvalidCallRequest`].
    pub async fn decide(
        &self,
        snapshot: ConversationSnapshot<'_>,
        descriptors: &[&OperationDescriptor],
    ) -> Result<Decision> {
        let params = ChatParams {
            model: self.model.clone(),
            messages: snapshot.history.to_vec(),
            tools: descriptors.iter().map(|d| d.to_tool()).collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "◆ DECIDE: {} messages, {} prior results, {} operations",
            snapshot.history.len(),
            snapshot.scratchpad.len(),
            descriptors.len()
        );

        let response = self.provider.chat(params).await?;
        debug!(
            "◆ BACKEND USAGE: {} prompt + {} completion tokens",
            response.usage.prompt_tokens, response.usage.completion_tokens
        );

        if response.has_tool_calls() {
            let first = &response.tool_calls[0];
            if response.tool_calls.len() > 1 {
                warn!(
                    "◆ BACKEND REQUESTED {} CALLS, USING '{}'",
                    response.tool_calls.len(),
                    first.name
                );
            }

            let id = if first.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                first.id.clone()
            };
            let call = OperationCall::new(id, &first.name, first.arguments.clone());

            if !descriptors.iter().any(|d| d.name == call.name) {
                return Err(AgentError::InvalidCallRequest(call));
            }
            if let Some(reason) = &first.argument_error {
                return Err(AgentError::MalformedArguments {
                    call,
                    reason: reason.clone(),
                });
            }
            return Ok(Decision::CallRequest(call));
        }

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(Decision::FinalAnswer(text)),
            _ => Err(AgentError::Backend(ProviderError::InvalidResponse)),
        }
    }
}
