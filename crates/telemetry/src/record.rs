//! Data model for activity records.
//!
//! One record per event, serialized as a single JSON line. The orchestrator
//! only ever writes these; nothing reads them back at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single activity-log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityRecord {
    /// One model completion call.
    LlmCall {
        conversation_id: String,
        model: String,
        prompt_tokens: u32,
        completion_tokens: u32,
        duration_ms: u64,
        tool_call_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        auth_mode: String,
    },

    /// One tool execution.
    ToolCall {
        conversation_id: String,
        tool_name: String,
        args: serde_json::Value,
        result: serde_json::Value,
        duration_ms: u64,
    },

    /// An agent-loop lifecycle transition.
    AgentEvent {
        conversation_id: String,
        event: String,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        detail: serde_json::Value,
    },
}

/// An [`ActivityRecord`] stamped with its emission time — the shape that
/// actually lands in the JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedRecord {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub record: ActivityRecord,
}

impl StampedRecord {
    pub fn now(record: ActivityRecord) -> Self {
        Self {
            timestamp: Utc::now(),
            record,
        }
    }
}

/// Terminal reasons an agent run can report.
pub mod reason {
    pub const DONE: &str = "done";
    pub const ABORTED: &str = "aborted";
    pub const TOOL_LIMIT_REACHED: &str = "tool_limit_reached";
}
