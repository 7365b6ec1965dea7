//! Sessions and the session store.
//!
//! A session owns two parallel views of one conversation: the append-only
//! message log the polling client replays, and the model-facing context the
//! loop sends to the provider. Both grow under the same lock, so readers
//! always see a consistent point-in-time state.
//!
//! The store enforces the one-run-per-session invariant: `start_run`
//! check-and-sets the `processing` flag atomically and the spawned run
//! clears it through a drop guard. No exit path can leave a session
//! processing forever, a panicking run included.

use crate::loop_runner::AgentLoop;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webhound_core::error::SessionError;
use webhound_core::message::ChatMessage;
use webhound_core::provider::ModelMessage;

/// Maximum number of in-memory sessions before the oldest are evicted.
const MAX_SESSIONS: usize = 1_000;

/// One conversation: id, log, model context, processing flag.
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    processing: AtomicBool,
}

struct SessionState {
    log: Vec<ChatMessage>,
    context: Vec<ModelMessage>,
}

/// A consistent point-in-time view for one poll.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    pub messages: Vec<ChatMessage>,
    pub is_processing: bool,
    pub total_messages: usize,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: RwLock::new(SessionState {
                log: Vec::new(),
                context: Vec::new(),
            }),
            processing: AtomicBool::new(false),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Append the user's request to both the log and the model context.
    pub fn push_user(&self, content: &str) {
        let mut state = self.write();
        state.log.push(ChatMessage::user(content));
        state.context.push(ModelMessage::user(content));
    }

    /// Append an interim assistant message (log only — the loop manages the
    /// matching context entry, which may carry tool calls).
    pub fn push_interim_assistant(&self, content: &str) {
        self.write().log.push(ChatMessage::assistant(content));
    }

    /// Append the terminal assistant answer to both views.
    pub fn push_final_assistant(&self, content: &str) {
        let mut state = self.write();
        state.log.push(ChatMessage::final_assistant(content));
        state.context.push(ModelMessage::assistant(content));
    }

    /// Append a system notice. It also enters the model context as a
    /// bracketed user message so the model reacts to it next turn.
    pub fn push_system(&self, content: &str) {
        let mut state = self.write();
        state.log.push(ChatMessage::system(content));
        state
            .context
            .push(ModelMessage::user(format!("[SYSTEM CHECK] {content}")));
    }

    /// Append a tool-activity record (log only).
    pub fn push_tool_activity(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        result: serde_json::Value,
        duration_ms: u64,
    ) {
        self.write()
            .log
            .push(ChatMessage::tool_activity(tool_name, args, result, duration_ms));
    }

    /// Append a downloaded-file notice (log only).
    pub fn push_file(&self, filename: &str, path: &str, size: u64) {
        self.write().log.push(ChatMessage::file(filename, path, size));
    }

    /// Append a message to the model context only (assistant turns carrying
    /// tool calls, and tool results).
    pub fn push_context(&self, message: ModelMessage) {
        self.write().context.push(message);
    }

    /// Make sure the system prompt is the first context entry.
    pub fn ensure_system_prompt(&self, prompt: &str) {
        let mut state = self.write();
        let has_system = state
            .context
            .first()
            .is_some_and(|m| m.role == webhound_core::provider::ModelRole::System);
        if !has_system {
            state.context.insert(0, ModelMessage::system(prompt));
        }
    }

    /// Clone of the model context for one completion request.
    pub fn context_snapshot(&self) -> Vec<ModelMessage> {
        self.read().context.clone()
    }

    /// The polling read: everything at index >= offset, plus the processing
    /// flag and the current log length. Offsets past the end yield an empty
    /// slice, never an error.
    pub fn snapshot_since(&self, offset: usize) -> LogSnapshot {
        let state = self.read();
        let total = state.log.len();
        let messages = state.log[offset.min(total)..].to_vec();
        LogSnapshot {
            messages,
            is_processing: self.is_processing(),
            total_messages: total,
        }
    }
}

/// Clears a session's processing flag when the run ends, however it ends.
struct ProcessingGuard {
    session: Arc<Session>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.session.processing.store(false, Ordering::Release);
    }
}

/// Concurrency-safe store of all live sessions.
pub struct SessionStore {
    sessions: tokio::sync::RwLock<HashMap<String, Arc<Session>>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: tokio::sync::RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Return the session for `id`, creating it (under the supplied id, or
    /// a fresh one when absent) if unknown.
    pub async fn create_or_get(&self, id: Option<&str>) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;

        if let Some(id) = id {
            if let Some(session) = sessions.get(id) {
                return session.clone();
            }
        }

        // Evict the oldest session when at capacity.
        if sessions.len() >= self.capacity {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.created_at)
                .map(|(k, _)| k.clone())
            {
                sessions.remove(&oldest);
            }
        }

        let id = id.map(str::to_string).unwrap_or_else(fresh_id);
        let session = Arc::new(Session::new(id.clone()));
        sessions.insert(id, session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Accept a user turn and hand off to the agent loop in the background.
    ///
    /// Fails with `AlreadyProcessing` when a run is active; the user message
    /// is appended only on acceptance, so a rejected request leaves the log
    /// untouched.
    pub fn start_run(
        &self,
        session: Arc<Session>,
        user_text: &str,
        agent: Arc<AgentLoop>,
    ) -> Result<(), SessionError> {
        if session
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyProcessing);
        }

        session.push_user(user_text);

        tokio::spawn(async move {
            let guard = ProcessingGuard {
                session: session.clone(),
            };
            agent.run(&session).await;
            drop(guard);
        });

        Ok(())
    }

    /// The polling read, by id.
    pub async fn snapshot_since(&self, id: &str, offset: usize) -> Option<LogSnapshot> {
        let session = self.get(id).await?;
        Some(session.snapshot_since(offset))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque 12-hex session id.
fn fresh_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
