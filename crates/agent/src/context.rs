//! System prompt assembly

use chrono::Local;

/// Builds the system instruction that opens every conversation.
///
/// The configured base prompt comes first, followed by a `Current Time`
/// section and any facts the caller wants the model to know up front, such
/// as the operator account it acts for.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    base: String,
    facts: Vec<(String, String)>,
    with_time: bool,
}

impl ContextBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            facts: Vec::new(),
            with_time: true,
        }
    }

    pub fn fact(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.push((label.into(), value.into()));
        self
    }

    /// Leave the timestamp out, mostly for deterministic tests
    pub fn without_time(mut self) -> Self {
        self.with_time = false;
        self
    }

    pub fn build(&self) -> String {
        let mut parts = vec![self.base.trim().to_string()];

        if self.with_time {
            let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
            parts.push(format!("## Current Time\n{}", now));
        }

        if !self.facts.is_empty() {
            let lines: Vec<String> = self
                .facts
                .iter()
                .map(|(label, value)| format!("- {}: {}", label, value))
                .collect();
            parts.push(format!("## Context\n{}", lines.join("\n")));
        }

        parts.retain(|p| !p.is_empty());
        parts.join("\n\n")
    }
}
