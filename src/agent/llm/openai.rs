//! OpenAI Chat Completions client.
//!
//! OpenAI uses a flat role-based history instead of content blocks: the
//! system prompt becomes a `system` message, assistant ToolUse blocks become
//! a `tool_calls` array with JSON-string arguments, and ToolResult blocks
//! become `tool`-role messages keyed by `tool_call_id`. The translation in
//! both directions lives here and nowhere else.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::Error;
use crate::tools::ToolDeclaration;
use crate::Result;

use super::super::message::{ContentBlock, Message, MessageContent, Role};
use super::{ChatClient, ChatResult, StopReason, Usage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completions client (function calling, role-based history).
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
}

/// Top-level Chat Completions response.
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAiClient {
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

    /// Convert the canonical conversation to OpenAI role-based messages.
    fn convert_messages(&self, system: &str, messages: &[Message]) -> Vec<Value> {
        let mut out = vec![json!({"role": "system", "content": system})];

        for msg in messages {
            match (&msg.role, &msg.content) {
                (Role::User, MessageContent::Text(text)) => {
                    out.push(json!({"role": "user", "content": text}));
                }
                (Role::User, MessageContent::Blocks(blocks)) => {
                    // Tool results fan out into one tool-role message each,
                    // preserving their order and correlation ids.
                    for block in blocks {
                        match block {
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                            } => out.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_use_id,
                                "content": content,
                            })),
                            ContentBlock::Text { text } => {
                                out.push(json!({"role": "user", "content": text}));
                            }
                            ContentBlock::ToolUse { .. } => {}
                        }
                    }
                }
                (Role::Assistant, content) => {
                    let blocks = match content {
                        MessageContent::Blocks(blocks) => blocks.as_slice(),
                        MessageContent::Text(_) => &[],
                    };

                    let mut text_parts = Vec::new();
                    let mut tool_calls = Vec::new();
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => text_parts.push(text.as_str()),
                            ContentBlock::ToolUse { id, name, input } => {
                                tool_calls.push(json!({
                                    "id": id,
                                    "type": "function",
                                    "function": {
                                        "name": name,
                                        "arguments": input.to_string(),
                                    },
                                }));
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }

                    let mut assistant = json!({"role": "assistant"});
                    assistant["content"] = if text_parts.is_empty() {
                        Value::Null
                    } else {
                        Value::String(text_parts.join("\n"))
                    };
                    if let MessageContent::Text(text) = content {
                        assistant["content"] = Value::String(text.clone());
                    }
                    if !tool_calls.is_empty() {
                        assistant["tool_calls"] = Value::Array(tool_calls);
                    }
                    out.push(assistant);
                }
            }
        }

        out
    }

    /// Convert tool declarations into OpenAI function-calling schemas.
    /// Field renames only; required/optional markers pass through untouched.
    fn convert_tools(&self, tools: &[ToolDeclaration]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    },
                })
            })
            .collect()
    }

    /// Normalize a Chat Completion into the canonical result shape.
    fn parse_response(&self, response: OpenAiResponse) -> Result<ChatResult> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("No choices in response".to_string()))?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text });
            }
        }

        for call in choice.message.tool_calls.unwrap_or_default() {
            let input: Value = serde_json::from_str(&call.function.arguments)
                .map_err(|e| Error::Llm(format!("Malformed tool arguments: {e}")))?;
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("stop") => StopReason::EndTurn,
            Some("tool_calls") => StopReason::ToolUse,
            _ => StopReason::Other,
        };

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResult {
            content,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ChatResult> {
        let mut request = json!({
            "model": self.model,
            "messages": self.convert_messages(system, messages),
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let converted = self.convert_tools(tools);
        if !converted.is_empty() {
            request["tools"] = Value::Array(converted);
        }

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(Error::Llm(format!("OpenAI API error: {error_text}")));
        }

        let parsed: OpenAiResponse = response.json().await?;
        self.parse_response(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new("test-key", &ModelConfig::default())
    }

    #[test]
    fn test_convert_messages_basic() {
        let messages = vec![Message::user("hello")];
        let converted = client().convert_messages("be brief", &messages);

        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[0]["content"], "be brief");
        assert_eq!(converted[1]["role"], "user");
        assert_eq!(converted[1]["content"], "hello");
    }

    #[test]
    fn test_convert_messages_tool_round_trip() {
        let messages = vec![
            Message::user("list files"),
            Message::assistant_blocks(vec![
                ContentBlock::text("Listing."),
                ContentBlock::tool_use("call_1", "bash", json!({"command": "ls"})),
            ]),
            Message::tool_results(vec![ContentBlock::tool_result("call_1", "notes.txt")]),
        ];

        let converted = client().convert_messages("", &messages);

        let assistant = &converted[2];
        assert_eq!(assistant["role"], "assistant");
        assert_eq!(assistant["content"], "Listing.");
        assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "bash");
        let args: Value =
            serde_json::from_str(assistant["tool_calls"][0]["function"]["arguments"].as_str().unwrap())
                .unwrap();
        assert_eq!(args, json!({"command": "ls"}));

        let tool_msg = &converted[3];
        assert_eq!(tool_msg["role"], "tool");
        assert_eq!(tool_msg["tool_call_id"], "call_1");
        assert_eq!(tool_msg["content"], "notes.txt");
    }

    #[test]
    fn test_convert_messages_null_content_when_only_tool_calls() {
        let messages = vec![Message::assistant_blocks(vec![ContentBlock::tool_use(
            "call_1",
            "bash",
            json!({}),
        )])];
        let converted = client().convert_messages("", &messages);
        assert_eq!(converted[1]["content"], Value::Null);
    }

    #[test]
    fn test_convert_tools_preserves_required() {
        let tools = vec![ToolDeclaration {
            name: "write_file".to_string(),
            description: "Write content to a file".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                },
                "required": ["path", "content"]
            }),
        }];

        let converted = client().convert_tools(&tools);
        assert_eq!(converted[0]["type"], "function");
        assert_eq!(converted[0]["function"]["name"], "write_file");
        assert_eq!(
            converted[0]["function"]["parameters"]["required"],
            json!(["path", "content"])
        );
    }

    #[test]
    fn test_parse_response_normalizes_tool_calls() {
        let wire: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_7",
                        "type": "function",
                        "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 9, "total_tokens": 14}
        }))
        .unwrap();

        let result = client().parse_response(wire).unwrap();

        assert_eq!(result.stop_reason, StopReason::ToolUse);
        assert_eq!(result.usage.input_tokens, 5);
        assert_eq!(result.usage.output_tokens, 9);
        assert_eq!(
            result.content,
            vec![ContentBlock::tool_use(
                "call_7",
                "read_file",
                json!({"path": "a.txt"})
            )]
        );
    }

    #[test]
    fn test_parse_response_stop_maps_to_end_turn() {
        let wire: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {"content": "All done."},
                "finish_reason": "stop"
            }]
        }))
        .unwrap();

        let result = client().parse_response(wire).unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.content, vec![ContentBlock::text("All done.")]);
        assert_eq!(result.usage, Usage::default());
    }

    #[test]
    fn test_parse_response_unknown_finish_reason() {
        let wire: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {"content": "truncated"},
                "finish_reason": "length"
            }]
        }))
        .unwrap();

        let result = client().parse_response(wire).unwrap();
        assert_eq!(result.stop_reason, StopReason::Other);
    }
}
