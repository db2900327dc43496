//! Web search tool — Tavily search API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::Result;

use super::Tool;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Search the web via the Tavily API.
pub struct SearchWebTool {
    api_key: String,
    client: reqwest::Client,
}

impl SearchWebTool {
    pub fn new(api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }
    fn description(&self) -> &str {
        "Search the web for a query and return a list of results with titles, URLs, and short content snippets. Use this to find relevant pages, then use web_fetch to read specific pages in full."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'query' parameter".to_string()))?;

        let request = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": MAX_RESULTS,
        });

        let response = match self.client.post(TAVILY_API_URL).json(&request).send().await {
            Ok(resp) => resp,
            Err(e) => return Ok(format!("Search failed: {e}")),
        };

        if !response.status().is_success() {
            return Ok(format!("Search failed: HTTP {}", response.status().as_u16()));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Ok(format!("Search failed: {e}")),
        };

        Ok(format_results(&parsed.results))
    }
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { "No title" } else { &r.title };
            let snippet: String = r.content.chars().take(SNIPPET_CHARS).collect();
            format!("{}. **{}**\n   {}\n   {}", i + 1, title, r.url, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
