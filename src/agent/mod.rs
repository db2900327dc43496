//! Agent module — core agent logic.
//!
//! This module contains:
//! - Canonical message and content-block types
//! - The chat client trait and provider adapters
//! - The agentic loop that interleaves model turns with tool execution
//! - The per-session usage tracker and budget enforcement
//!
//! # Adding a New LLM Provider
//!
//! See [`llm::ProviderRegistry`] for instructions.

mod loop_impl;
mod message;
mod usage;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use llm::{AnthropicClient, ChatClient, ChatResult, OpenAiClient, ProviderRegistry, StopReason, Usage};
pub use loop_impl::{AgentLoop, LoopOutcome};
pub use message::{ContentBlock, Message, MessageContent, Role};
pub use usage::UsageTracker;
