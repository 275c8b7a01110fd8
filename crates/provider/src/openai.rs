//! OpenAI-compatible chat completions backend
//!
//! Serves both OpenAI and Groq, which expose the same wire format.

use crate::*;
use reqwest::Client;
use serde_json::json;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible backend
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self::named("openai", api_key, api_base, OPENAI_API_BASE, default_model, "gpt-4o-mini")
    }

    /// Groq speaks the OpenAI protocol under its own base URL
    pub fn groq(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self::named(
            "groq",
            api_key,
            api_base,
            GROQ_API_BASE,
            default_model,
            "llama-3.3-70b-versatile",
        )
    }

    fn named(
        name: &str,
        api_key: impl Into<String>,
        api_base: Option<String>,
        fallback_base: &str,
        default_model: Option<String>,
        fallback_model: &str,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.to_string(),
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| fallback_base.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: default_model.unwrap_or_else(|| fallback_model.to_string()),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": m.role.as_str() });
                obj["content"] = match &m.content {
                    Some(content) => json!(content),
                    None => serde_json::Value::Null,
                };
                if let Some(tool_calls) = &m.tool_calls {
                    // arguments travel as a JSON-encoded string on this wire;
                    // undecodable text is echoed back verbatim
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.function.name,
                                    "arguments": match &tc.function.arguments {
                                        serde_json::Value::String(raw) => raw.clone(),
                                        other => other.to_string(),
                                    },
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let name = function["name"]
                    .as_str()
                    .ok_or(ProviderError::InvalidResponse)?;
                let id = call["id"].as_str().unwrap_or_default();
                let arguments = match &function["arguments"] {
                    serde_json::Value::String(raw) if raw.trim().is_empty() => json!({}),
                    serde_json::Value::String(raw) => match serde_json::from_str(raw) {
                        Ok(arguments) => arguments,
                        Err(e) => {
                            debug!("undecodable arguments for '{}': {}", name, e);
                            tool_calls.push(ToolCall::malformed(
                                id,
                                name,
                                raw.as_str(),
                                e.to_string(),
                            ));
                            continue;
                        }
                    },
                    serde_json::Value::Null => json!({}),
                    other => other.clone(),
                };

                tool_calls.push(ToolCall::new(id, name, arguments));
            }
        }

        let usage = json["usage"]
            .as_object()
            .map(|usage| {
                let count = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                Usage {
                    prompt_tokens: count("prompt_tokens"),
                    completion_tokens: count("completion_tokens"),
                    total_tokens: count("total_tokens"),
                }
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/chat/completions", self.api_base);
        trace_request(&self.name, &url, &params);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(status_error(status, error));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let parsed = self.parse_response(json)?;
        debug!(
            backend = %self.name,
            tool_calls = parsed.tool_calls.len(),
            tokens = parsed.usage.total_tokens,
            "chat response received"
        );
        Ok(parsed)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
