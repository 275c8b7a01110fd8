//! Shared fixtures for agent tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hedera_agent_core::{
    AgentLoop, CapabilityBundle, FieldKind, InputSchema, LoopLimits, ModelAdapter,
    OperationDescriptor, OperationFailure, OperationHandler, OperationRegistry,
};
use hedera_agent_provider::{ChatParams, ChatResponse, Provider, ProviderError, Role};
use serde_json::Value;

/// One scripted backend turn
pub enum Step {
    Reply(ChatResponse),
    Fail(ProviderError),
    /// Sleep, then answer with the given text
    Stall(Duration, String),
}

/// Backend that plays back a script, then repeats a fallback reply
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<ChatResponse>,
    calls: AtomicUsize,
    seen: Mutex<Vec<ChatParams>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn repeating(reply: ChatResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ChatParams> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params);

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Stall(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(ChatResponse::text(text))
            }
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ProviderError::Api("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> String {
        "scripted-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Stateless backend: calls `operation` until a tool result is the last
/// turn, then answers with that result
pub struct RelayProvider {
    pub operation: String,
}

#[async_trait]
impl Provider for RelayProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        match params.messages.last() {
            Some(last) if last.role == Role::Tool => {
                Ok(ChatResponse::text(format!("done: {}", last.text())))
            }
            _ => Ok(ChatResponse::tool_call(
                "",
                self.operation.clone(),
                serde_json::json!({}),
            )),
        }
    }

    fn name(&self) -> &str {
        "relay"
    }

    fn default_model(&self) -> String {
        "relay-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Handler that counts invocations and plays back canned results
pub struct CountingHandler {
    count: Arc<AtomicUsize>,
    results: Mutex<VecDeque<Result<String, OperationFailure>>>,
    fallback: Result<String, OperationFailure>,
    delay: Option<Duration>,
}

impl CountingHandler {
    pub fn ok(output: &str) -> (Self, Arc<AtomicUsize>) {
        Self::scripted(vec![], Ok(output.to_string()))
    }

    pub fn scripted(
        results: Vec<Result<String, OperationFailure>>,
        fallback: Result<String, OperationFailure>,
    ) -> (Self, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (
            Self {
                count: count.clone(),
                results: Mutex::new(results.into()),
                fallback,
                delay: None,
            },
            count,
        )
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl OperationHandler for CountingHandler {
    async fn execute(&self, _arguments: &Value) -> Result<String, OperationFailure> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn balance_descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "get_hbar_balance",
        "HBAR balance of an account, the operator when omitted",
        InputSchema::new().optional("account_id", FieldKind::String, "Account id"),
    )
}

pub fn token_info_descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "get_token_info",
        "Metadata of a token",
        InputSchema::new().required("token_id", FieldKind::String, "Token id"),
    )
}

pub fn registry_with(
    operations: Vec<(OperationDescriptor, CountingHandler)>,
) -> Arc<OperationRegistry> {
    let mut bundle = CapabilityBundle::new("test-queries");
    for (descriptor, handler) in operations {
        bundle = bundle.with_operation(descriptor, handler);
    }
    let mut registry = OperationRegistry::new();
    registry.register(bundle).unwrap();
    Arc::new(registry)
}

pub fn agent(
    provider: Arc<dyn Provider>,
    registry: Arc<OperationRegistry>,
    limits: LoopLimits,
) -> AgentLoop {
    AgentLoop::new(ModelAdapter::new(provider, ""), registry).with_limits(limits)
}

pub fn fast_limits() -> LoopLimits {
    LoopLimits {
        max_iterations: 5,
        max_protocol_retries: 3,
        model_timeout: Duration::from_millis(500),
        operation_timeout: Duration::from_millis(500),
    }
}
