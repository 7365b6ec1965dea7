//! # webhound-telemetry
//!
//! Append-only JSON-lines activity log for agent runs. The agent loop
//! writes one record per model call, tool call, and lifecycle transition;
//! nothing in the orchestrator ever reads the log back, so a write failure
//! is logged and dropped rather than propagated into the run.

pub mod record;

pub use record::{ActivityRecord, StampedRecord, reason};

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The activity log sink.
///
/// Thread-safe; `record()` never fails the caller.
pub struct ActivityLog {
    sink: Sink,
}

enum Sink {
    /// Append to `<dir>/activity.jsonl`.
    Jsonl {
        path: PathBuf,
        file: Mutex<Option<File>>,
    },
    /// Keep records in memory (tests).
    Memory(Mutex<Vec<StampedRecord>>),
    /// Drop everything (telemetry disabled).
    Disabled,
}

impl ActivityLog {
    /// A JSONL-backed log under the given directory. The directory is
    /// created lazily on first write.
    pub fn jsonl(dir: impl AsRef<Path>) -> Self {
        Self {
            sink: Sink::Jsonl {
                path: dir.as_ref().join("activity.jsonl"),
                file: Mutex::new(None),
            },
        }
    }

    /// An in-memory log for tests and assertions.
    pub fn memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
        }
    }

    /// A log that drops all records.
    pub fn disabled() -> Self {
        Self {
            sink: Sink::Disabled,
        }
    }

    /// Append one record. IO failures are logged via `tracing` and dropped.
    pub fn record(&self, record: ActivityRecord) {
        let stamped = StampedRecord::now(record);
        match &self.sink {
            Sink::Jsonl { path, file } => {
                let mut guard = file.lock().unwrap_or_else(|e| e.into_inner());
                if guard.is_none() {
                    match open_append(path) {
                        Ok(f) => *guard = Some(f),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "Failed to open activity log");
                            return;
                        }
                    }
                }
                if let Some(f) = guard.as_mut() {
                    match serde_json::to_string(&stamped) {
                        Ok(line) => {
                            if let Err(e) = writeln!(f, "{line}") {
                                tracing::warn!(error = %e, "Failed to write activity record");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to serialize activity record");
                        }
                    }
                }
            }
            Sink::Memory(records) => {
                records
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(stamped);
            }
            Sink::Disabled => {}
        }
    }

    /// Snapshot of all records captured so far. Empty unless this is a
    /// memory sink.
    pub fn records(&self) -> Vec<StampedRecord> {
        match &self.sink {
            Sink::Memory(records) => records.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            _ => Vec::new(),
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_captures_records() {
        let log = ActivityLog::memory();
        log.record(ActivityRecord::AgentEvent {
            conversation_id: "c1".into(),
            event: reason::DONE.into(),
            detail: serde_json::Value::Null,
        });
        log.record(ActivityRecord::ToolCall {
            conversation_id: "c1".into(),
            tool_name: "search".into(),
            args: serde_json::json!({"query": "x"}),
            result: serde_json::json!({"results": []}),
            duration_ms: 10,
        });

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert!(matches!(
            records[0].record,
            ActivityRecord::AgentEvent { .. }
        ));
    }

    #[test]
    fn disabled_sink_drops_everything() {
        let log = ActivityLog::disabled();
        log.record(ActivityRecord::AgentEvent {
            conversation_id: "c1".into(),
            event: "started".into(),
            detail: serde_json::Value::Null,
        });
        assert!(log.records().is_empty());
    }

    #[test]
    fn jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ActivityLog::jsonl(dir.path());

        log.record(ActivityRecord::LlmCall {
            conversation_id: "c1".into(),
            model: "gpt-4.1".into(),
            prompt_tokens: 10,
            completion_tokens: 5,
            duration_ms: 100,
            tool_call_count: 0,
            finish_reason: Some("stop".into()),
            auth_mode: "api_key".into(),
        });
        log.record(ActivityRecord::AgentEvent {
            conversation_id: "c1".into(),
            event: reason::DONE.into(),
            detail: serde_json::json!({"tool_call_count_total": 0}),
        });

        let content = std::fs::read_to_string(dir.path().join("activity.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "llm_call");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "done");
    }
}
