//! OpenAI-compatible HTTP backend for the `LlmProvider` trait.
//!
//! Speaks the chat-completions wire format, including function tools, so the
//! same provider works against OpenAI, OpenRouter, or any compatible proxy.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

const PROVIDER: &str = "openai";

/// OpenAI-compatible chat-completions provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        model: String,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            max_tokens,
            temperature,
            timeout,
        })
    }

    async fn post(&self, request: &WireRequest) -> Result<WireResponse, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        response
            .json::<WireResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to parse response: {e}"),
            })
    }

    fn wire_request(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> WireRequest {
        WireRequest {
            model: self.model.clone(),
            messages: messages.iter().map(wire_message).collect(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(wire_tool).collect())
            },
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        tracing::debug!(
            provider = PROVIDER,
            model = %self.model,
            messages = request.messages.len(),
            "Plain completion"
        );

        let body = self.wire_request(&request.messages, &[]);
        let response = self.post(&body).await?;
        let (message, usage) = extract_choice(response)?;

        let content = message.content.ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response missing content in choices[0]".to_string(),
        })?;

        Ok(CompletionResponse {
            content,
            input_tokens: usage.0,
            output_tokens: usage.1,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        tracing::debug!(
            provider = PROVIDER,
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Tool completion"
        );

        let body = self.wire_request(&request.messages, &request.tools);
        let response = self.post(&body).await?;
        let (message, usage) = extract_choice(response)?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(parse_tool_call)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ToolCompletionResponse {
            content: message.content.filter(|c| !c.is_empty()),
            tool_calls,
            input_tokens: usage.0,
            output_tokens: usage.1,
        })
    }
}

fn extract_choice(response: WireResponse) -> Result<(WireResponseMessage, (u32, u32)), LlmError> {
    let usage = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "response missing choices[0]".to_string(),
        })?;

    Ok((choice.message, usage))
}

fn parse_tool_call(call: WireToolCall) -> Result<ToolCall, LlmError> {
    let arguments = if call.function.arguments.trim().is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(&call.function.arguments).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!(
                "tool call {} carried unparseable arguments: {e}",
                call.function.name
            ),
        })?
    };

    Ok(ToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    })
}

fn wire_message(message: &ChatMessage) -> WireMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
        )
    };

    WireMessage {
        role: role.to_string(),
        // Assistant tool-call messages may carry no text
        content: if message.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(message.content.clone())
        },
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn wire_tool(tool: &ToolDefinition) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: tool.clone(),
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: ToolDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object, per the chat-completions protocol.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(
            "https://api.openai.com/v1/chat/completions".to_string(),
            SecretString::from("test-key"),
            "gpt-4o-mini".to_string(),
            512,
            0.2,
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[test]
    fn test_wire_request_shape() {
        let p = provider();
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ];
        let tools = vec![ToolDefinition {
            name: "read_feed".to_string(),
            description: "Read a feed".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];

        let wire = serde_json::to_value(p.wire_request(&messages, &tools)).unwrap();
        assert_eq!(wire["model"], "gpt-4o-mini");
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["messages"][1]["content"], "hello");
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["tools"][0]["function"]["name"], "read_feed");
        assert_eq!(wire["stream"], false);
    }

    #[test]
    fn test_wire_request_omits_empty_tools() {
        let p = provider();
        let wire = serde_json::to_value(p.wire_request(&[ChatMessage::user("hi")], &[])).unwrap();
        assert!(wire.get("tools").is_none());
    }

    #[test]
    fn test_assistant_tool_call_roundtrip() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "read_feed".to_string(),
            arguments: serde_json::json!({"url": "https://example.com/rss"}),
        };
        let message = ChatMessage::assistant_tool_calls(None, vec![call]);
        let wire = serde_json::to_value(wire_message(&message)).unwrap();

        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["content"], serde_json::Value::Null);
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        // Arguments are a JSON-encoded string on the wire
        let args: serde_json::Value =
            serde_json::from_str(wire["tool_calls"][0]["function"]["arguments"].as_str().unwrap())
                .unwrap();
        assert_eq!(args["url"], "https://example.com/rss");
    }

    #[test]
    fn test_parse_tool_call_arguments() {
        let raw: WireToolCall = serde_json::from_value(serde_json::json!({
            "id": "call_9",
            "type": "function",
            "function": {"name": "summarize_articles", "arguments": "{\"articles\": [1, 2]}"}
        }))
        .unwrap();

        let call = parse_tool_call(raw).unwrap();
        assert_eq!(call.name, "summarize_articles");
        assert_eq!(call.arguments["articles"][0], 1);
    }

    #[test]
    fn test_parse_tool_call_empty_arguments() {
        let raw: WireToolCall = serde_json::from_value(serde_json::json!({
            "id": "call_2",
            "type": "function",
            "function": {"name": "publish_digest", "arguments": ""}
        }))
        .unwrap();

        let call = parse_tool_call(raw).unwrap();
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_tool_call_bad_arguments_rejected() {
        let raw: WireToolCall = serde_json::from_value(serde_json::json!({
            "id": "call_3",
            "type": "function",
            "function": {"name": "read_feed", "arguments": "{not json"}
        }))
        .unwrap();

        assert!(matches!(
            parse_tool_call(raw),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_response_parsing() {
        let response: WireResponse = serde_json::from_value(serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Done.",
                    "tool_calls": null
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        }))
        .unwrap();

        let (message, usage) = extract_choice(response).unwrap();
        assert_eq!(message.content.as_deref(), Some("Done."));
        assert_eq!(usage, (10, 3));
    }
}
