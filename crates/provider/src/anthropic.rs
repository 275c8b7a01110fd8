//! Anthropic Messages API backend

use crate::*;
use reqwest::Client;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic backend
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: default_model
                .unwrap_or_else(|| "claude-3-haiku-20240307".to_string()),
        }
    }

    fn build_request(&self, params: &ChatParams) -> MessagesRequest {
        let system_parts: Vec<&str> = params
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .collect();

        // the model always chooses between answering and calling
        let tool_choice = if params.tools.is_empty() {
            None
        } else {
            Some(serde_json::json!({"type": "auto"}))
        };

        MessagesRequest {
            model: if params.model.is_empty() {
                self.default_model.clone()
            } else {
                params.model.clone()
            },
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n")),
            messages: convert_messages(&params.messages),
            tools: params
                .tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t.function.parameters.clone(),
                })
                .collect(),
            tool_choice,
        }
    }

    fn parse_response(&self, response: MessagesResponse) -> ChatResponse {
        let mut text = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text: t } => text.push(t),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input))
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }

        let joined = text.join("");
        ChatResponse {
            content: (!joined.is_empty()).then_some(joined),
            tool_calls,
            finish_reason: response.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
            usage: Usage {
                prompt_tokens: response.usage.input_tokens,
                completion_tokens: response.usage.output_tokens,
                total_tokens: response.usage.input_tokens + response.usage.output_tokens,
            },
        }
    }
}

/// Convert the transcript into Anthropic turns.
///
/// System messages move to the top-level `system` field. Tool results become
/// `tool_result` blocks inside a user turn, and consecutive turns of the same
/// role are merged since the API rejects them.
fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut result: Vec<AnthropicMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => continue,
            Role::User => (
                "user",
                vec![ContentBlock::Text {
                    text: msg.text().to_string(),
                }],
            ),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.text().is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: msg.text().to_string(),
                    });
                }
                for call in msg.tool_calls.iter().flatten() {
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        // tool_use input must be an object
                        input: match &call.function.arguments {
                            Value::Object(_) => call.function.arguments.clone(),
                            _ => Value::Object(Default::default()),
                        },
                    });
                }
                ("assistant", blocks)
            }
            Role::Tool => (
                "user",
                vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.text().to_string(),
                }],
            ),
        };

        if blocks.is_empty() {
            continue;
        }

        match result.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => result.push(AnthropicMessage {
                role,
                content: blocks,
            }),
        }
    }

    result
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/v1/messages", self.api_base);
        trace_request("anthropic", &url, &params);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(status_error(status, message));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)?;
        let response = self.parse_response(parsed);
        debug!(
            backend = "anthropic",
            tool_calls = response.tool_calls.len(),
            tokens = response.usage.total_tokens,
            "chat response received"
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
