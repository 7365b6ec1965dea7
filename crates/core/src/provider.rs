//! ModelClient trait — the abstraction over the language-model backend.
//!
//! The agent loop calls `complete()` with the conversation context and the
//! registry's tool schemas, and gets back either tool-call requests or a
//! final text answer, plus usage metadata. One bounded external call; the
//! implementation owns the request timeout.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in the shape the model provider expects.
///
/// This is distinct from [`crate::message::ChatMessage`]: the session log
/// records everything the client sees, while this type carries only what
/// the model should see (no tool_activity/file bookkeeping rows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,

    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ModelToolCall>,

    /// For tool-result messages, which tool call this answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Roles understood by the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// A tool-result message answering the given call id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelToolCall {
    /// Provider-assigned call id (echoed back with the result)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string, exactly as the model produced them
    pub arguments: String,
}

/// A tool schema advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,

    pub messages: Vec<ModelMessage>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call; empty disables tool use for this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.2
}

/// A completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated assistant message (text and/or tool calls)
    pub message: ModelMessage,

    /// Token usage as reported by the provider
    pub usage: Option<Usage>,

    /// Provider finish reason ("stop", "tool_calls", "length", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Which model actually answered
    pub model: String,
}

/// Token usage counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The model-client trait. The agent loop is the only caller; tests swap in
/// scripted implementations.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A short name for this backend (e.g. "openai").
    fn name(&self) -> &str;

    /// How this client authenticates — "api_key" or "bearer". Recorded in
    /// llm_call activity records, never used for behavior.
    fn auth_mode(&self) -> &str {
        "api_key"
    }

    /// Send a request and await the complete response.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// Can we reach the provider at all?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
