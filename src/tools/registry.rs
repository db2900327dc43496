//! Tool registry — manages and dispatches tools.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::Config;

use super::Tool;

/// Static tool declaration forwarded to the provider adapters.
///
/// Serializes directly to the Anthropic tool shape; the OpenAI adapter wraps
/// it into its function-calling schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Maps tool names to executable tools and dispatches calls to them.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the standard tool set.
    pub fn new_with_defaults(config: &Config) -> Self {
        use super::{
            BashTool, ReadEmailTool, ReadFileTool, ReadMessagesTool, SearchWebTool, SendEmailTool,
            SendMessageTool, WebFetchTool, WriteFileTool,
        };

        let mut registry = Self::new();

        registry.register(BashTool);
        registry.register(ReadFileTool);
        registry.register(WriteFileTool);
        registry.register(WebFetchTool::new());
        registry.register(SearchWebTool::new(&config.tavily_api_key));
        registry.register(ReadEmailTool::new(config.email.clone()));
        registry.register(SendEmailTool::new(config.email.clone()));
        registry.register(ReadMessagesTool);
        registry.register(SendMessageTool);

        registry
    }

    /// Register a tool.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Declarations for all registered tools.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|t| t.declaration()).collect()
    }

    /// Dispatch a call by tool name.
    ///
    /// Never fails: the model is the only caller and must be able to react
    /// to whatever happened, so unknown names and internal tool errors both
    /// come back as ordinary result strings.
    pub async fn dispatch(&self, name: &str, input: Value) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Dispatch to unregistered tool");
            return format!("Unknown tool: {name}");
        };

        match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                format!("Error: {e}")
            }
        }
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
