//! Conversation message types.
//!
//! The canonical shapes here follow the Anthropic content-block model: a
//! message is either a plain user string or an ordered list of tagged
//! [`ContentBlock`]s. Provider adapters translate to and from these types at
//! their boundary; nothing downstream ever sees a provider wire type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One unit of structured message content.
///
/// Serializes to the Anthropic wire shape (`{"type": "text", ...}` etc.), so
/// the Anthropic adapter can forward conversations verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Model-authored natural-language output.
    Text { text: String },

    /// A model request to invoke a tool. `id` is opaque and must be echoed
    /// back on the matching result.
    ToolUse { id: String, name: String, input: Value },

    /// The textual result of executing a `ToolUse`, tagged with the id it
    /// answers.
    ToolResult { tool_use_id: String, content: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
        }
    }
}

/// Message content: a single opaque string, or an ordered block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation.
///
/// The conversation is the ordered list of these, and is the literal context
/// window sent to the model each turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message carrying the model's content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create a user message carrying tool results.
    ///
    /// This is the only place `ToolResult` blocks are allowed to appear: a
    /// user message directly answering the preceding assistant turn.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        debug_assert!(blocks
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. })));
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, MessageContent::Text("Hello".to_string()));
    }

    #[test]
    fn test_content_block_wire_shape() {
        let block = ContentBlock::tool_use("tu_1", "bash", json!({"command": "ls"}));
        let wire = serde_json::to_value(&block).unwrap();
        assert_eq!(wire["type"], "tool_use");
        assert_eq!(wire["id"], "tu_1");
        assert_eq!(wire["name"], "bash");
        assert_eq!(wire["input"]["command"], "ls");
    }

    #[test]
    fn test_content_block_round_trip() {
        let blocks = vec![
            ContentBlock::text("Checking the file."),
            ContentBlock::tool_use("tu_1", "read_file", json!({"path": "notes.txt"})),
        ];
        let json = serde_json::to_string(&blocks).unwrap();
        let parsed: Vec<ContentBlock> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, blocks);
    }

    #[test]
    fn test_message_content_untagged() {
        let plain = Message::user("hi");
        let wire = serde_json::to_value(&plain).unwrap();
        assert_eq!(wire["content"], "hi");

        let results = Message::tool_results(vec![ContentBlock::tool_result("tu_1", "ok")]);
        let wire = serde_json::to_value(&results).unwrap();
        assert_eq!(wire["role"], "user");
        assert_eq!(wire["content"][0]["type"], "tool_result");
        assert_eq!(wire["content"][0]["tool_use_id"], "tu_1");
    }
}
