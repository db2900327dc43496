//! Web fetch tool — retrieve a URL as readable text.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Error;
use crate::Result;

use super::Tool;

const MAX_CHARS: usize = 20_000;
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetch a URL and return its body, with HTML stripped to plain text.
pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Otto/1.0")
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }
    fn description(&self) -> &str {
        "Fetch the contents of a URL and return the response body as readable text. HTML pages are automatically stripped to plain text. Response is truncated to ~20k characters."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let url = input
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'url' parameter".to_string()))?;

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return Ok(format!("Request failed for {url}: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(format!("HTTP error {} fetching {url}", status.as_u16()));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => return Ok(format!("Failed to read response from {url}: {e}")),
        };

        let text = if content_type.contains("html") {
            html_to_text(&body)
        } else {
            body
        };

        if text.len() > MAX_CHARS {
            let mut end = MAX_CHARS;
            while end > 0 && !text.is_char_boundary(end) {
                end -= 1;
            }
            Ok(format!(
                "{}\n\n... truncated ({} chars total)",
                &text[..end],
                text.len()
            ))
        } else {
            Ok(text)
        }
    }
}

/// Very basic HTML to text conversion.
fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();

    // Drop scripts and styles with their content
    for (open, close) in [("<script", "</script>"), ("<style", "</style>")] {
        while let Some(start) = text.find(open) {
            if let Some(end) = text[start..].find(close) {
                text = format!("{}{}", &text[..start], &text[start + end + close.len()..]);
            } else {
                break;
            }
        }
    }

    // Strip remaining tags
    let mut result = String::new();
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><title>Test</title></head><body><p>Hello World</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Hello World"));
    }

    #[test]
    fn test_html_to_text_removes_scripts_and_styles() {
        let html = "<body><script>alert('hi');</script><style>p{color:red}</style><p>Content</p></body>";
        let text = html_to_text(html);
        assert!(text.contains("Content"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
    }

    #[tokio::test]
    async fn test_missing_url_parameter() {
        let result = WebFetchTool::new().execute(json!({})).await;
        assert!(matches!(result, Err(Error::Tool(_))));
    }
}
