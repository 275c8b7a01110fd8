//! Operation registry
//!
//! Built once at startup from capability bundles, read-only afterwards.

use std::collections::HashMap;

use hedera_agent_provider::Tool;
use serde_json::Value;
use tracing::debug;

use crate::operation::{OperationDescriptor, OperationFailure, OperationHandler};
use crate::{AgentError, Result};

/// A named group of operations registered together
pub struct CapabilityBundle {
    name: String,
    operations: Vec<(OperationDescriptor, Box<dyn OperationHandler>)>,
}

impl CapabilityBundle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    pub fn with_operation<H: OperationHandler + 'static>(
        mut self,
        descriptor: OperationDescriptor,
        handler: H,
    ) -> Self {
        self.operations.push((descriptor, Box::new(handler)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Descriptor plus the handler that owns its execution
pub struct RegisteredOperation {
    pub descriptor: OperationDescriptor,
    pub bundle: String,
    handler: Box<dyn OperationHandler>,
}

impl RegisteredOperation {
    pub async fn execute(&self, arguments: &Value) -> std::result::Result<String, OperationFailure> {
        self.handler.execute(arguments).await
    }
}

/// Operation name to descriptor and handler, in insertion order
#[derive(Default)]
pub struct OperationRegistry {
    operations: Vec<RegisteredOperation>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a bundle into the active set.
    ///
    /// Any name collision, with the registry or inside the bundle itself,
    /// rejects the whole bundle and leaves the registry untouched.
    pub fn register(&mut self, bundle: CapabilityBundle) -> Result<()> {
        let mut incoming: Vec<&str> = Vec::with_capacity(bundle.operations.len());
        for (descriptor, _) in &bundle.operations {
            let name = descriptor.name.as_str();
            if self.index.contains_key(name) || incoming.contains(&name) {
                return Err(AgentError::DuplicateOperation(name.to_string()));
            }
            incoming.push(name);
        }

        let CapabilityBundle { name, operations } = bundle;
        debug!("◆ REGISTERING BUNDLE '{}' ({} operations)", name, operations.len());

        for (descriptor, handler) in operations {
            self.index
                .insert(descriptor.name.clone(), self.operations.len());
            self.operations.push(RegisteredOperation {
                descriptor,
                bundle: name.clone(),
                handler,
            });
        }

        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisteredOperation> {
        self.index
            .get(name)
            .map(|&i| &self.operations[i])
            .ok_or_else(|| AgentError::UnknownOperation(name.to_string()))
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<&OperationDescriptor> {
        self.operations.iter().map(|op| &op.descriptor).collect()
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.operations
            .iter()
            .map(|op| op.descriptor.to_tool())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations
            .iter()
            .map(|op| op.descriptor.name.as_str())
            .collect()
    }

    pub fn operations(&self) -> impl Iterator<Item = &RegisteredOperation> {
        self.operations.iter()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
