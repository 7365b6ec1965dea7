//! # webhound-tools
//!
//! The research agent's capabilities: web search, page scrape, and file
//! download, all backed by the Bright Data request API. The registry built
//! here is closed — these three tools are everything the model can call.

pub mod client;
pub mod download;
pub mod inspect;
pub mod scrape;
pub mod search;

pub use client::BrightDataClient;
pub use download::DownloadFileTool;
pub use scrape::ScrapePageTool;
pub use search::SearchTool;

use std::sync::Arc;
use webhound_config::AppConfig;
use webhound_core::tool::ToolRegistry;

/// Create the default tool registry from configuration.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let client = Arc::new(BrightDataClient::new(&config.bright_data));

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool::new(client.clone())));
    registry.register(Box::new(ScrapePageTool::new(client.clone())));
    registry.register(Box::new(DownloadFileTool::new(
        client,
        config.download.base_dir.clone(),
    )));
    registry
}
