//! # webhound-providers
//!
//! Model-client implementations. The only backend the orchestrator needs
//! is an OpenAI-compatible chat-completions endpoint; everything else about
//! the provider (auth mode, corporate proxies) stays behind that boundary.

pub mod openai_compat;

pub use openai_compat::{AuthMode, OpenAiCompatClient};

use std::sync::Arc;
use webhound_config::AppConfig;
use webhound_core::ModelClient;

/// Build the model client from configuration.
///
/// Returns `None` when no API key is configured — the caller decides
/// whether that is fatal (serve) or merely reported (doctor).
pub fn build_from_config(config: &AppConfig) -> Option<Arc<dyn ModelClient>> {
    let api_key = config.api_key.clone()?;
    Some(Arc::new(OpenAiCompatClient::new(
        "openai",
        config.provider_url.clone(),
        api_key,
    )))
}
