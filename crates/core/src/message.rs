//! Chat message domain types.
//!
//! A session's message log is an append-only sequence of these values.
//! Everything a polling client ever sees is a slice of that log, so a
//! message is immutable once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who (or what) produced a message in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user's request text
    User,
    /// Model output — interim progress or the final answer
    Assistant,
    /// A record of one tool invocation (name, args, result, duration)
    ToolActivity,
    /// A file landed in the download directory
    File,
    /// Server-side notices (verification warnings, run failures)
    System,
}

/// A single entry in a session's message log.
///
/// Only the fields matching the role are populated; the rest serialize
/// away. A message has no explicit sequence number; its position in the
/// log is what the polling offset counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced this message
    pub role: Role,

    /// The text content (user/assistant/system), or a short label for
    /// tool_activity and file rows
    pub content: String,

    /// When the message was appended
    pub timestamp: DateTime<Utc>,

    /// True only on the terminal assistant message of a completed run.
    /// Interim assistant messages (thinking aloud before tool calls) stay
    /// false, so clients never have to infer finality from position.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub final_answer: bool,

    /// Tool name, for tool_activity rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Parsed tool arguments, for tool_activity rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<serde_json::Value>,

    /// Structured tool result (carries an "error" key on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,

    /// Wall-clock tool execution time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_duration_ms: Option<u64>,

    /// Saved filename, for file rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Path on disk, for file rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Size in bytes, for file rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl ChatMessage {
    fn base(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            final_answer: false,
            tool_name: None,
            tool_args: None,
            tool_result: None,
            tool_duration_ms: None,
            filename: None,
            file_path: None,
            file_size: None,
        }
    }

    /// A user request message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content)
    }

    /// An interim assistant message (progress, not the answer).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content)
    }

    /// The terminal assistant message of a run.
    pub fn final_assistant(content: impl Into<String>) -> Self {
        let mut msg = Self::base(Role::Assistant, content);
        msg.final_answer = true;
        msg
    }

    /// A server-side notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content)
    }

    /// A record of one executed tool call.
    pub fn tool_activity(
        tool_name: impl Into<String>,
        tool_args: serde_json::Value,
        tool_result: serde_json::Value,
        duration_ms: u64,
    ) -> Self {
        let name = tool_name.into();
        let mut msg = Self::base(Role::ToolActivity, format!("Called {name}"));
        msg.tool_name = Some(name);
        msg.tool_args = Some(tool_args);
        msg.tool_result = Some(tool_result);
        msg.tool_duration_ms = Some(duration_ms);
        msg
    }

    /// A downloaded-file notice.
    pub fn file(filename: impl Into<String>, file_path: impl Into<String>, file_size: u64) -> Self {
        let name = filename.into();
        let mut msg = Self::base(Role::File, format!("Downloaded {name}"));
        msg.filename = Some(name);
        msg.file_path = Some(file_path.into());
        msg.file_size = Some(file_size);
        msg
    }
}
