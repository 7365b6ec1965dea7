//! Page scrape tool — fetch a page via Web Unlocker, return clean markdown.

use crate::client::{BrightDataClient, SCRAPE_TIMEOUT};
use async_trait::async_trait;
use htmd::HtmlToMarkdown;
use std::sync::Arc;
use tracing::warn;
use webhound_core::error::ToolError;
use webhound_core::tool::{Tool, ToolResult};

/// Chars of converted markdown to keep.
const CONTENT_LIMIT: usize = 12_000;

pub struct ScrapePageTool {
    client: Arc<BrightDataClient>,
}

impl ScrapePageTool {
    pub fn new(client: Arc<BrightDataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ScrapePageTool {
    fn name(&self) -> &str {
        "scrape_page"
    }

    fn description(&self) -> &str {
        "Scrape a web page via Bright Data Web Unlocker. Returns the page content \
         converted to clean markdown format. Use this to read any web page, find links, \
         extract information, or navigate sites. The content is automatically cleaned - \
         HTML tags, scripts, and navigation elements are removed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The full URL of the page to scrape."
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let page_url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        let response = match self.client.unlock(page_url, SCRAPE_TIMEOUT).await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %page_url, error = %e, "Scrape failed");
                return Ok(ToolResult::failed(serde_json::json!({
                    "error": e.to_string(),
                    "url": page_url,
                    "content": "",
                })));
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let raw = response.text().await.unwrap_or_default();

        let mut content = if content_type.contains("html") || raw.trim_start().starts_with('<') {
            html_to_markdown(&raw)
        } else {
            raw
        };
        content.truncate(CONTENT_LIMIT);

        Ok(ToolResult::ok(serde_json::json!({
            "url": page_url,
            "content": content,
            "content_type": content_type,
        })))
    }
}

/// Convert HTML to markdown, dropping chrome elements and collapsing the
/// blank lines the conversion leaves behind.
fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "footer", "header"])
        .build();

    let markdown = match converter.convert(html) {
        Ok(md) => md,
        Err(e) => {
            warn!(error = %e, "HTML conversion failed, returning raw text");
            html.to_string()
        }
    };

    markdown
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
