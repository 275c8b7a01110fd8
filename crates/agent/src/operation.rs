//! Callable operations: descriptors, calls, results and the handler contract

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use hedera_agent_provider::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Primitive type of one named argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: String,
}

/// Named arguments an operation accepts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, false, description)
    }

    fn field(mut self, name: &str, kind: FieldKind, required: bool, description: &str) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required,
            description: description.to_string(),
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// JSON Schema object handed to the backend
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                json!({
                    "type": field.kind.as_str(),
                    "description": field.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check arguments against the declared fields.
    ///
    /// `null` is treated as an empty object. Optional fields may be `null`;
    /// names the schema does not declare are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let empty = Map::new();
        let object = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => return Err(format!("arguments must be an object, got {}", other)),
        };

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !field.kind.accepts(value) => {
                    return Err(format!(
                        "field '{}' must be {}, got {}",
                        field.name, field.kind, value
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Static declaration of one callable capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Structured signature offered to the backend
    pub fn to_tool(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.input_schema.to_json())
    }
}

/// Operation call proposed by the model for one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl OperationCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Output(String),
    Failure(String),
}

/// A resolved call, kept on the scratchpad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub call: OperationCall,
    pub outcome: OperationOutcome,
}

impl OperationResult {
    pub fn output(call: OperationCall, output: impl Into<String>) -> Self {
        Self {
            call,
            outcome: OperationOutcome::Output(output.into()),
        }
    }

    pub fn failure(call: OperationCall, reason: impl Into<String>) -> Self {
        Self {
            call,
            outcome: OperationOutcome::Failure(reason.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, OperationOutcome::Failure(_))
    }

    /// Text folded back to the model as the tool message
    pub fn render(&self) -> String {
        match &self.outcome {
            OperationOutcome::Output(output) => output.clone(),
            OperationOutcome::Failure(reason) => format!("Error: {}", reason),
        }
    }

    /// One-line summary used in error reports
    pub fn summary(&self) -> String {
        let text: String = self.render().chars().take(120).collect();
        format!("{} -> {}", self.call.name, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The model may retry, pick another operation or explain
    Recoverable,
    /// Retrying within this request is pointless
    Fatal,
}

/// Handler failure with its classification
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl OperationFailure {
    pub fn recoverable(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Recoverable,
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::Fatal
    }
}

/// Executable side of an operation.
///
/// Arguments have already passed schema validation when this is called.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> OperationHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, OperationFailure>> + Send,
{
    async fn execute(&self, arguments: &Value) -> Result<String, OperationFailure> {
        (self.0)(arguments.clone()).await
    }
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> impl OperationHandler
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, OperationFailure>> + Send,
{
    FnHandler(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance_schema() -> InputSchema {
        InputSchema::new()
            .required("account_id", FieldKind::String, "Account in shard.realm.num form")
            .optional("limit", FieldKind::Integer, "Maximum rows")
    }

    #[test]
    fn test_schema_to_json() {
        let schema = balance_schema().to_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["account_id"]["type"], "string");
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["required"], json!(["account_id"]));
    }

    #[test]
    fn test_empty_schema_still_an_object() {
        let schema = InputSchema::new().to_json();
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["required"], json!([]));
        assert!(InputSchema::new().validate(&Value::Null).is_ok());
        assert!(InputSchema::new().validate(&json!({})).is_ok());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let schema = balance_schema();
        assert!(schema.validate(&json!({"account_id": "0.0.2"})).is_ok());
        assert!(schema.validate(&json!({"account_id": "0.0.2", "limit": 5})).is_ok());
        assert!(schema.validate(&json!({"account_id": "0.0.2", "limit": null})).is_ok());
        assert!(schema.validate(&json!({"account_id": "0.0.2", "extra": true})).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_required() {
        let err = balance_schema().validate(&json!({})).unwrap_err();
        assert!(err.contains("account_id"));

        let err = balance_schema().validate(&json!({"account_id": null})).unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn test_validate_rejects_mistyped() {
        let err = balance_schema()
            .validate(&json!({"account_id": 2}))
            .unwrap_err();
        assert!(err.contains("must be string"));

        let err = balance_schema()
            .validate(&json!({"account_id": "0.0.2", "limit": 2.5}))
            .unwrap_err();
        assert!(err.contains("must be integer"));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(balance_schema().validate(&json!("0.0.2")).is_err());
        assert!(InputSchema::new().validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_number_accepts_integers() {
        let schema = InputSchema::new().required("amount", FieldKind::Number, "Amount");
        assert!(schema.validate(&json!({"amount": 3})).is_ok());
        assert!(schema.validate(&json!({"amount": 3.5})).is_ok());
    }

    #[test]
    fn test_descriptor_to_tool() {
        let descriptor =
            OperationDescriptor::new("get_hbar_balance", "HBAR balance of an account", balance_schema());
        let tool = descriptor.to_tool();
        assert_eq!(tool.name(), "get_hbar_balance");
        assert_eq!(tool.function.description, "HBAR balance of an account");
        assert_eq!(tool.function.parameters["required"], json!(["account_id"]));
    }

    #[test]
    fn test_result_render() {
        let call = OperationCall::new("c1", "get_hbar_balance", json!({}));
        let ok = OperationResult::output(call.clone(), "42 ℏ");
        let failed = OperationResult::failure(call, "mirror node timed out");

        assert_eq!(ok.render(), "42 ℏ");
        assert!(!ok.is_failure());
        assert_eq!(failed.render(), "Error: mirror node timed out");
        assert!(failed.is_failure());
        assert_eq!(failed.summary(), "get_hbar_balance -> Error: mirror node timed out");
    }

    #[test]
    fn test_failure_kinds() {
        assert!(OperationFailure::fatal("bad key").is_fatal());
        assert!(!OperationFailure::recoverable("429").is_fatal());
        assert_eq!(OperationFailure::fatal("bad key").to_string(), "bad key");
    }

    #[tokio::test]
    async fn test_handler_fn() {
        let handler = handler_fn(|args: Value| async move {
            match args["account_id"].as_str() {
                Some(id) => Ok(format!("balance of {}", id)),
                None => Err(OperationFailure::recoverable("no account")),
            }
        });

        assert_eq!(
            handler.execute(&json!({"account_id": "0.0.7"})).await.unwrap(),
            "balance of 0.0.7"
        );
        assert!(handler.execute(&json!({})).await.is_err());
    }
}
