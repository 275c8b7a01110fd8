//! Conversation transcript and per-request scratchpad

use hedera_agent_provider::{Message, ToolCallDef};

use crate::operation::OperationResult;

/// Borrowed, read-only view handed to the model adapter
#[derive(Debug, Clone, Copy)]
pub struct ConversationSnapshot<'a> {
    pub history: &'a [Message],
    pub scratchpad: &'a [OperationResult],
}

/// Append-only history plus the scratchpad of the in-flight request
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    history: Vec<Message>,
    scratchpad: Vec<OperationResult>,
}

impl ConversationState {
    /// Start a transcript with a system instruction
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let history = if system_prompt.is_empty() {
            Vec::new()
        } else {
            vec![Message::system(system_prompt)]
        };
        Self {
            history,
            scratchpad: Vec::new(),
        }
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.history.push(Message::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.history.push(Message::assistant(text));
    }

    /// Record a resolved call: the assistant turn that requested it, the tool
    /// turn carrying its result, and the scratchpad entry.
    pub fn append_tool_result(&mut self, result: OperationResult) {
        let call = &result.call;
        self.history.push(Message::assistant_tool_calls(vec![ToolCallDef::new(
            &call.id,
            &call.name,
            call.arguments.clone(),
        )]));
        self.history
            .push(Message::tool(&call.id, &call.name, result.render()));
        self.scratchpad.push(result);
    }

    pub fn snapshot(&self) -> ConversationSnapshot<'_> {
        ConversationSnapshot {
            history: &self.history,
            scratchpad: &self.scratchpad,
        }
    }

    pub fn reset_scratchpad(&mut self) {
        self.scratchpad.clear();
    }

    /// Drain the scratchpad, leaving it empty
    pub fn take_scratchpad(&mut self) -> Vec<OperationResult> {
        std::mem::take(&mut self.scratchpad)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn scratchpad(&self) -> &[OperationResult] {
        &self.scratchpad
    }
}
