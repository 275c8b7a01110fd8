//! Multi-turn session over a shared agent loop

use std::sync::Arc;

use hedera_agent_provider::Message;
use tokio_util::sync::CancellationToken;

use crate::conversation::ConversationState;
use crate::loop_agent::{AgentLoop, RunOutcome};
use crate::Result;

/// One user's conversation. History carries over between [`ask`](Self::ask)
/// calls; each call gets a fresh scratchpad.
pub struct AgentSession {
    agent: Arc<AgentLoop>,
    state: ConversationState,
}

impl AgentSession {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        let state = agent.new_conversation();
        Self { agent, state }
    }

    pub async fn ask(&mut self, input: &str, cancel: &CancellationToken) -> Result<RunOutcome> {
        self.agent.run(&mut self.state, input, cancel).await
    }

    pub fn history(&self) -> &[Message] {
        self.state.history()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Drop the transcript and start over with the system prompt
    pub fn clear(&mut self) {
        self.state = self.agent.new_conversation();
    }
}
