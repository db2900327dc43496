//! Tools module — assistant capabilities.
//!
//! Tools are the external actions the assistant can take: shell commands,
//! file I/O, web search and fetch, email, and local messaging. Each one is a
//! pure `(structured input) -> string result` function described by a static
//! declaration; everything interesting happens in the loop that calls them.

mod registry;
mod contacts;
mod email;
mod filesystem;
mod messaging;
mod search;
mod shell;
mod web;

pub use registry::{ToolDeclaration, ToolRegistry};

pub use email::{ReadEmailTool, SendEmailTool};
pub use filesystem::{ReadFileTool, WriteFileTool};
pub use messaging::{ReadMessagesTool, SendMessageTool};
pub use search::SearchWebTool;
pub use shell::BashTool;
pub use web::WebFetchTool;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Tool trait — interface for all assistant tools.
///
/// `execute` may block on network or OS calls; every implementation bounds
/// its own blocking work with a hard wall-clock cap so one slow tool cannot
/// hang a session.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in tool calls.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given input.
    async fn execute(&self, input: Value) -> Result<String>;

    /// Convert to a declaration for the provider adapters.
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Dummy tool for testing.
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Dummy tool for testing"
    }
    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        Ok(self.result.clone())
    }
}
