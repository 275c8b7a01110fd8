//! Agent loop - core processing engine

use std::sync::Arc;
use std::time::Duration;

use hedera_agent_config::{AgentDefaults, Config};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::{Decision, ModelAdapter};
use crate::conversation::ConversationState;
use crate::operation::{OperationCall, OperationResult};
use crate::registry::OperationRegistry;
use crate::{AgentError, Budget, Result};

/// Bounds on one top-level request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopLimits {
    /// Model decisions allowed before giving up
    pub max_iterations: u32,
    /// Protocol errors folded back before giving up
    pub max_protocol_retries: u32,
    pub model_timeout: Duration,
    pub operation_timeout: Duration,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self::from(&AgentDefaults::default())
    }
}

impl From<&AgentDefaults> for LoopLimits {
    fn from(defaults: &AgentDefaults) -> Self {
        Self {
            max_iterations: defaults.max_iterations,
            max_protocol_retries: defaults.max_protocol_retries,
            model_timeout: Duration::from_secs(defaults.model_timeout_secs),
            operation_timeout: Duration::from_secs(defaults.operation_timeout_secs),
        }
    }
}

/// A finished request
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub answer: String,
    /// Scratchpad of the request, in call order
    pub steps: Vec<OperationResult>,
    /// Model decisions it took
    pub iterations: u32,
}

/// The agent loop drives decide/execute/fold until a final answer
pub struct AgentLoop {
    adapter: ModelAdapter,
    registry: Arc<OperationRegistry>,
    limits: LoopLimits,
    system_prompt: String,
}

impl AgentLoop {
    pub fn new(adapter: ModelAdapter, registry: Arc<OperationRegistry>) -> Self {
        let defaults = AgentDefaults::default();
        Self {
            adapter,
            registry,
            limits: LoopLimits::from(&defaults),
            system_prompt: defaults.system_prompt,
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Build from configuration; fails fast when no backend is usable
    pub fn from_config(config: &Config, registry: Arc<OperationRegistry>) -> Result<Self> {
        let adapter = ModelAdapter::from_config(config)?;
        let defaults = &config.agent.defaults;
        Ok(Self::new(adapter, registry)
            .with_limits(LoopLimits::from(defaults))
            .with_system_prompt(defaults.system_prompt.clone()))
    }

    pub fn adapter(&self) -> &ModelAdapter {
        &self.adapter
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Fresh transcript opened with this loop's system prompt
    pub fn new_conversation(&self) -> ConversationState {
        ConversationState::new(self.system_prompt.clone())
    }

    /// One request in its own conversation, answer only
    pub async fn run_once(&self, input: &str) -> Result<String> {
        let mut state = self.new_conversation();
        let outcome = self
            .run(&mut state, input, &CancellationToken::new())
            .await?;
        Ok(outcome.answer)
    }

    /// Process one top-level request against `state`.
    ///
    /// The scratchpad is cleared before the first iteration and drained into
    /// the returned [`RunOutcome`]; history keeps growing across requests.
    /// `cancel` is checked before every model call, so an operation already
    /// running is allowed to finish.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        info!("Processing request ({} chars)", input.len());
        state.reset_scratchpad();
        state.append_user(input);

        let descriptors = self.registry.descriptors();
        let mut protocol_errors = 0u32;

        for iteration in 1..=self.limits.max_iterations {
            if cancel.is_cancelled() {
                info!("◆ CANCELLED BEFORE ITERATION {}", iteration);
                return Err(AgentError::Cancelled {
                    iterations: iteration - 1,
                });
            }

            debug!("Agent iteration {}", iteration);

            let decided = timeout(
                self.limits.model_timeout,
                self.adapter.decide(state.snapshot(), &descriptors),
            )
            .await;

            let call = match decided {
                Ok(Ok(Decision::FinalAnswer(answer))) => {
                    state.append_assistant(answer.clone());
                    let steps = state.take_scratchpad();
                    info!(
                        "◆ ANSWERED after {} iteration(s), {} operation result(s)",
                        iteration,
                        steps.len()
                    );
                    return Ok(RunOutcome {
                        answer,
                        steps,
                        iterations: iteration,
                    });
                }
                Ok(Ok(Decision::CallRequest(call))) => call,
                Ok(Err(AgentError::InvalidCallRequest(call))) => {
                    warn!("◆ BACKEND REQUESTED UNOFFERED OPERATION '{}'", call.name);
                    self.count_protocol_error(&mut protocol_errors, state)?;
                    let reason = format!("operation '{}' is not available", call.name);
                    state.append_tool_result(OperationResult::failure(call, reason));
                    continue;
                }
                Ok(Err(AgentError::MalformedArguments { call, reason })) => {
                    warn!("◆ UNDECODABLE ARGUMENTS FOR '{}': {}", call.name, reason);
                    self.count_protocol_error(&mut protocol_errors, state)?;
                    let reason = format!("invalid arguments: {}", reason);
                    state.append_tool_result(OperationResult::failure(call, reason));
                    continue;
                }
                Ok(Err(AgentError::Backend(e))) if e.is_transient() => {
                    warn!("◆ BACKEND TRANSIENT FAILURE: {}", e);
                    self.count_protocol_error(&mut protocol_errors, state)?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!("◆ BACKEND TIMED OUT after {:?}", self.limits.model_timeout);
                    self.count_protocol_error(&mut protocol_errors, state)?;
                    continue;
                }
            };

            self.dispatch(state, call, &mut protocol_errors).await?;
        }

        Err(AgentError::LoopExceeded {
            budget: Budget::Iterations,
            limit: self.limits.max_iterations,
            last_state: last_state(state),
        })
    }

    /// Resolve, validate and execute one call, folding its result.
    ///
    /// Only a fatal handler failure or an exhausted retry budget escapes.
    async fn dispatch(
        &self,
        state: &mut ConversationState,
        call: OperationCall,
        protocol_errors: &mut u32,
    ) -> Result<()> {
        let operation = match self.registry.resolve(&call.name) {
            Ok(operation) => operation,
            Err(e) => {
                warn!("{}", e);
                self.count_protocol_error(protocol_errors, state)?;
                let reason = format!("unknown operation '{}'", call.name);
                state.append_tool_result(OperationResult::failure(call, reason));
                return Ok(());
            }
        };

        if let Err(reason) = operation.descriptor.input_schema.validate(&call.arguments) {
            let err = AgentError::ArgumentValidation {
                operation: call.name.clone(),
                reason: reason.clone(),
            };
            warn!("{}", err);
            self.count_protocol_error(protocol_errors, state)?;
            state.append_tool_result(OperationResult::failure(
                call,
                format!("invalid arguments: {}", reason),
            ));
            return Ok(());
        }

        debug!("Executing operation: {}", call.name);
        let executed = timeout(
            self.limits.operation_timeout,
            operation.execute(&call.arguments),
        )
        .await;

        match executed {
            Ok(Ok(output)) => {
                state.append_tool_result(OperationResult::output(call, output));
            }
            Ok(Err(failure)) if failure.is_fatal() => {
                let name = call.name.clone();
                state.append_tool_result(OperationResult::failure(call, failure.reason.clone()));
                return Err(AgentError::OperationExecution {
                    operation: name,
                    reason: failure.reason,
                });
            }
            Ok(Err(failure)) => {
                warn!("◆ OPERATION '{}' FAILED: {}", call.name, failure);
                state.append_tool_result(OperationResult::failure(call, failure.reason));
            }
            Err(_) => {
                let limit = self.limits.operation_timeout;
                warn!("◆ OPERATION '{}' TIMED OUT after {:?}", call.name, limit);
                state.append_tool_result(OperationResult::failure(
                    call,
                    format!("timed out after {:?}", limit),
                ));
            }
        }

        Ok(())
    }

    fn count_protocol_error(&self, count: &mut u32, state: &ConversationState) -> Result<()> {
        *count += 1;
        if *count > self.limits.max_protocol_retries {
            return Err(AgentError::LoopExceeded {
                budget: Budget::ProtocolRetries,
                limit: self.limits.max_protocol_retries,
                last_state: last_state(state),
            });
        }
        Ok(())
    }
}

fn last_state(state: &ConversationState) -> String {
    state
        .scratchpad()
        .last()
        .map(OperationResult::summary)
        .unwrap_or_else(|| "no operation results".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_follow_defaults() {
        let limits = LoopLimits::default();
        assert_eq!(limits.max_iterations, 15);
        assert_eq!(limits.max_protocol_retries, 3);
        assert_eq!(limits.model_timeout, Duration::from_secs(60));
        assert_eq!(limits.operation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_limits_from_custom_defaults() {
        let defaults = AgentDefaults {
            max_iterations: 4,
            operation_timeout_secs: 2,
            ..AgentDefaults::default()
        };
        let limits = LoopLimits::from(&defaults);
        assert_eq!(limits.max_iterations, 4);
        assert_eq!(limits.operation_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_last_state_description() {
        let mut state = ConversationState::default();
        assert_eq!(last_state(&state), "no operation results");

        state.append_tool_result(OperationResult::output(
            OperationCall::new("c", "get_hbar_balance", serde_json::json!({})),
            "42 ℏ",
        ));
        assert_eq!(last_state(&state), "get_hbar_balance -> 42 ℏ");
    }
}
