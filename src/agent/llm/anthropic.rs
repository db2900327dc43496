//! Anthropic Messages API client.
//!
//! The canonical conversation already uses Anthropic-style content blocks,
//! so the request side is mostly pass-through; the response side parses the
//! wire blocks back into canonical [`ContentBlock`]s.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::Error;
use crate::tools::ToolDeclaration;
use crate::Result;

use super::super::message::{ContentBlock, Message};
use super::{ChatClient, ChatResult, StopReason, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client (native tool calling, dedicated
/// `tool_result` message parts).
#[derive(Clone, Debug)]
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
}

/// Top-level Messages API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

/// A single response content block. Unknown kinds are skipped during
/// normalization rather than failing the whole response.
#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
    id: Option<String>,
    name: Option<String>,
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicClient {
    /// Create a new client. The underlying HTTP client is created once and
    /// reused across calls.
    pub fn new(api_key: &str, model: &ModelConfig) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.name.clone(),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            client: Client::new(),
        }
    }

    fn build_request(&self, system: &str, messages: &[Message], tools: &[ToolDeclaration]) -> Value {
        let mut request = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": messages,
        });
        if !tools.is_empty() {
            request["tools"] = json!(tools);
        }
        request
    }

    fn parse_response(&self, response: AnthropicResponse) -> ChatResult {
        let mut content = Vec::with_capacity(response.content.len());

        for block in response.content {
            match block.kind.as_str() {
                "text" => {
                    if let Some(text) = block.text {
                        content.push(ContentBlock::Text { text });
                    }
                }
                "tool_use" => {
                    if let (Some(id), Some(name)) = (block.id, block.name) {
                        content.push(ContentBlock::ToolUse {
                            id,
                            name,
                            input: block.input.unwrap_or_else(|| json!({})),
                        });
                    }
                }
                other => {
                    tracing::debug!("Skipping unrecognized content block: {other}");
                }
            }
        }

        let stop_reason = match response.stop_reason.as_deref() {
            Some("end_turn") => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            _ => StopReason::Other,
        };

        ChatResult {
            content,
            stop_reason,
            usage: Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ChatResult> {
        let request = self.build_request(system, messages, tools);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("Anthropic API error: {error_text}")));
        }

        let parsed: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(parsed))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new("test-key", &ModelConfig::default())
    }

    #[test]
    fn test_request_round_trips_tool_results() {
        let messages = vec![
            Message::user("list my files"),
            Message::assistant_blocks(vec![
                ContentBlock::text("Listing now."),
                ContentBlock::tool_use("tu_1", "bash", json!({"command": "ls"})),
            ]),
            Message::tool_results(vec![ContentBlock::tool_result("tu_1", "notes.txt")]),
        ];

        let request = client().build_request("be brief", &messages, &[]);

        assert_eq!(request["system"], "be brief");
        assert_eq!(request["messages"][0]["content"], "list my files");
        assert_eq!(request["messages"][1]["content"][1]["type"], "tool_use");
        assert_eq!(request["messages"][1]["content"][1]["id"], "tu_1");
        assert_eq!(
            request["messages"][2]["content"][0]["tool_use_id"],
            "tu_1"
        );
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let request = client().build_request("", &[Message::user("hi")], &[]);
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_tool_declarations_forwarded_verbatim() {
        let tools = vec![ToolDeclaration {
            name: "bash".to_string(),
            description: "Run a shell command".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"command": {"type": "string"}},
                "required": ["command"]
            }),
        }];
        let request = client().build_request("", &[Message::user("hi")], &tools);
        assert_eq!(request["tools"][0]["name"], "bash");
        assert_eq!(request["tools"][0]["input_schema"]["required"][0], "command");
    }

    #[test]
    fn test_parse_response_normalizes_blocks() {
        let wire: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "tu_9", "name": "read_file", "input": {"path": "a.txt"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 34}
        }))
        .unwrap();

        let result = client().parse_response(wire);

        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert_eq!(result.usage.input_tokens, 12);
        assert_eq!(result.usage.output_tokens, 34);
        assert_eq!(
            result.content,
            vec![
                ContentBlock::text("Checking."),
                ContentBlock::tool_use("tu_9", "read_file", json!({"path": "a.txt"})),
            ]
        );
    }

    #[test]
    fn test_parse_response_unknown_stop_reason_maps_to_other() {
        let wire: AnthropicResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "partial"}],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 1, "output_tokens": 2}
        }))
        .unwrap();

        let result = client().parse_response(wire);
        assert_eq!(result.stop_reason, StopReason::Other);
    }

    #[test]
    fn test_parse_response_skips_unrecognized_blocks() {
        let wire: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "text": "hmm"},
                {"type": "text", "text": "done"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 0, "output_tokens": 0}
        }))
        .unwrap();

        let result = client().parse_response(wire);
        assert_eq!(result.content, vec![ContentBlock::text("done")]);
    }
}
