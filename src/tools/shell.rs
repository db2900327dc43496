//! Shell tool — run commands.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::Error;
use crate::Result;

use super::Tool;

/// Hard wall-clock cap per invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Run shell commands.
pub struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "Run a shell command and return its stdout and stderr. Use this to explore the system, run scripts, install packages, etc."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'command' parameter".to_string()))?;

        let output = tokio::time::timeout(
            COMMAND_TIMEOUT,
            Command::new("sh").arg("-c").arg(command).output(),
        )
        .await
        .map_err(|_| Error::Tool(format!("Command timed out after {}s", COMMAND_TIMEOUT.as_secs())))?
        .map_err(|e| Error::Tool(format!("Failed to execute command: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = stdout.to_string();
        if !stderr.is_empty() {
            result.push_str(&format!("\nSTDERR:\n{stderr}"));
        }

        let trimmed = result.trim();
        if trimmed.is_empty() {
            Ok("(no output)".to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }
}
