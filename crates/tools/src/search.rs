//! Web search tool — Google SERP results via Bright Data.
//!
//! Backend failures come back as a failed result payload rather than an
//! `Err`, so the model sees the failure and can adapt.

use crate::client::BrightDataClient;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use webhound_core::error::ToolError;
use webhound_core::tool::{Tool, ToolResult};

const MAX_RESULTS: usize = 10;

pub struct SearchTool {
    client: Arc<BrightDataClient>,
}

impl SearchTool {
    pub fn new(client: Arc<BrightDataClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search Google via Bright Data SERP API. Returns organic results with title, url, \
         and snippet. Use for finding web pages, documents, download links, company \
         information, or any web query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The Google search query string."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let target = match url::Url::parse_with_params(
            "https://www.google.com/search",
            &[("q", query), ("num", "10")],
        ) {
            Ok(u) => u,
            Err(e) => {
                return Err(ToolError::InvalidArguments(format!("Bad query: {e}")));
            }
        };

        let response = match self.client.serp(target.as_str()).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "SERP search failed");
                return Ok(ToolResult::failed(serde_json::json!({
                    "error": e.to_string(),
                    "results": [],
                })));
            }
        };

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = response.text().await.unwrap_or_default();
        let data: serde_json::Value = if is_json {
            serde_json::from_str(&body).unwrap_or_default()
        } else {
            serde_json::Value::Null
        };

        let results: Vec<SearchResult> = data["organic"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .take(MAX_RESULTS)
                    .map(|item| SearchResult {
                        title: item["title"].as_str().unwrap_or_default().to_string(),
                        url: item["link"]
                            .as_str()
                            .or_else(|| item["url"].as_str())
                            .unwrap_or_default()
                            .to_string(),
                        snippet: item["description"]
                            .as_str()
                            .or_else(|| item["snippet"].as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if results.is_empty() && !body.is_empty() {
            return Ok(ToolResult::ok(serde_json::json!({
                "results": [],
                "note": "SERP returned HTML instead of structured data. Try a different query.",
            })));
        }

        Ok(ToolResult::ok(serde_json::json!({ "results": results })))
    }
}
