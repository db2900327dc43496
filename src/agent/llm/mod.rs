//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`ChatClient`] trait for swappable LLM providers
//! - [`ProviderRegistry`] for provider selection from configuration
//! - Concrete implementations: Anthropic Messages API, OpenAI Chat Completions
//!
//! Adapters are pure translation functions at the boundary: the canonical
//! conversation goes in, a canonical [`ChatResult`] comes out, and no
//! provider wire type leaks past `chat()`.
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `gemini.rs`)
//! 2. Implement `ChatClient`, normalizing the response into `ChatResult`
//! 3. Add a match arm in `ProviderRegistry::create()`
//! 4. Add config fields in `config.rs`

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Error;
use crate::tools::ToolDeclaration;
use crate::Result;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use super::message::{ContentBlock, Message};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Natural completion of the turn.
    EndTurn,
    /// The model wants tool results before continuing.
    ToolUse,
    /// Anything the adapter did not recognize. The loop keeps going only if
    /// tool calls are present, else stops.
    Other,
}

/// Token usage reported by the provider for a single call.
///
/// Always provider-reported, never estimated locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The normalized output of one model call.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Ordered content blocks: Text and/or ToolUse, never ToolResult.
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl ChatResult {
    /// Create a simple end-of-turn text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(content)],
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        }
    }

    /// Iterate over the ToolUse blocks, in emission order.
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }

    /// Check if the result carries any tool calls.
    #[inline]
    pub fn has_tool_uses(&self) -> bool {
        self.tool_uses().next().is_some()
    }
}

/// LLM client trait — swappable provider abstraction.
///
/// Implementations must round-trip every Text, ToolUse, and ToolResult block
/// through the provider's native request shape without semantic loss.
#[async_trait]
pub trait ChatClient: Send + Sync + std::fmt::Debug {
    /// Send the conversation and tool declarations, get a normalized result.
    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ChatResult>;

    /// Model identifier this client is configured for.
    fn model(&self) -> &str;
}

#[async_trait]
impl ChatClient for Box<dyn ChatClient> {
    async fn chat(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<ChatResult> {
        (**self).chat(system, messages, tools).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

/// Provider registry — creates chat clients from configuration.
///
/// # Example
///
/// ```ignore
/// let client = ProviderRegistry::create(&config)?;
/// let result = client.chat(system, &messages, &tools).await?;
/// ```
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Create a chat client from configuration.
    ///
    /// Supported providers:
    /// - `"anthropic"`: Anthropic Messages API (native tool calling)
    /// - `"openai"`: OpenAI Chat Completions API (function calling)
    ///
    /// An unknown provider string is a hard configuration error, raised
    /// before any session starts.
    pub fn create(config: &Config) -> Result<Box<dyn ChatClient>> {
        match config.model.provider.as_str() {
            "anthropic" => {
                let key = resolve_key(&config.anthropic_api_key, "ANTHROPIC_API_KEY")?;
                Ok(Box::new(AnthropicClient::new(&key, &config.model)))
            }
            "openai" => {
                let key = resolve_key(&config.openai_api_key, "OPENAI_API_KEY")?;
                Ok(Box::new(OpenAiClient::new(&key, &config.model)))
            }
            other => Err(Error::Config(format!("Unknown provider: {other}"))),
        }
    }

    /// List available provider names.
    pub fn available() -> &'static [&'static str] {
        &["anthropic", "openai"]
    }
}

fn resolve_key(configured: &str, env_var: &str) -> Result<String> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    std::env::var(env_var).map_err(|_| {
        Error::Config(format!(
            "Missing API key: set it in the config file or export {env_var}"
        ))
    })
}

/// Fake chat client for testing — replays a scripted queue of results.
#[cfg(test)]
#[derive(Debug)]
pub struct FakeChatClient {
    results: std::sync::Mutex<std::collections::VecDeque<ChatResult>>,
}

#[cfg(test)]
impl FakeChatClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            results: std::sync::Mutex::new(
                responses.iter().map(|s| ChatResult::text(*s)).collect(),
            ),
        }
    }

    /// Create from an explicit result script.
    pub fn scripted(results: Vec<ChatResult>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_use(name: &str, input: serde_json::Value, final_response: &str) -> Self {
        let tool_turn = ChatResult {
            content: vec![ContentBlock::tool_use("tu_1", name, input)],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        };
        Self::scripted(vec![tool_turn, ChatResult::text(final_response)])
    }
}

#[cfg(test)]
#[async_trait]
impl ChatClient for FakeChatClient {
    async fn chat(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[ToolDeclaration],
    ) -> Result<ChatResult> {
        let mut results = self.results.lock().unwrap();
        results
            .pop_front()
            .ok_or_else(|| Error::Llm("No more scripted results".to_string()))
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;

    #[tokio::test]
    async fn test_fake_chat_client_replays_in_order() {
        let client = FakeChatClient::new(vec!["Hello!", "World!"]);

        let first = client.chat("", &[], &[]).await.unwrap();
        assert_eq!(first.content, vec![ContentBlock::text("Hello!")]);

        let second = client.chat("", &[], &[]).await.unwrap();
        assert_eq!(second.content, vec![ContentBlock::text("World!")]);

        assert!(client.chat("", &[], &[]).await.is_err());
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = Config {
            model: ModelConfig {
                provider: "mystery".to_string(),
                ..ModelConfig::default()
            },
            ..Config::default()
        };
        let err = ProviderRegistry::create(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Unknown provider: mystery"));
    }

    #[test]
    fn test_tool_uses_preserve_order() {
        let result = ChatResult {
            content: vec![
                ContentBlock::text("Running two tools."),
                ContentBlock::tool_use("a", "first", serde_json::json!({})),
                ContentBlock::tool_use("b", "second", serde_json::json!({})),
            ],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        };
        let ids: Vec<&str> = result.tool_uses().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
