//! The agent loop — one run per accepted user turn.
//!
//! Alternates model calls and tool dispatches, appending every step to the
//! session's message log, until the model answers without tool calls or
//! the tool budget forces a final, tool-free turn. Tool failures are
//! absorbed into the conversation; only model failures abort the run.

use crate::prompts;
use crate::session::Session;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use webhound_config::AgentConfig;
use webhound_core::error::ProviderError;
use webhound_core::provider::{
    ModelClient, ModelMessage, ModelRequest, ModelResponse, ModelRole, ModelToolCall,
    ToolDefinition,
};
use webhound_core::tool::{ToolRegistry, ToolResult};
use webhound_telemetry::{ActivityLog, ActivityRecord, reason};

/// Chars of a serialized tool result fed back into the model context.
const RESULT_CONTEXT_LIMIT: usize = 15_000;

/// Minimum plausible sizes per extension; smaller downloads get a warning.
const MIN_SIZES: &[(&str, u64)] = &[(".pdf", 20_000), (".xlsx", 5_000), (".xls", 5_000)];

/// The per-session state machine driving model and tool turns.
pub struct AgentLoop {
    client: Arc<dyn ModelClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    max_tool_calls: u32,
    activity: Arc<ActivityLog>,
}

impl AgentLoop {
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        activity: Arc<ActivityLog>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tools,
            max_tool_calls: config.max_tool_calls,
            activity,
        }
    }

    /// Tool names and agent settings, for the transparency endpoint.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tool_calls(&self) -> u32 {
        self.max_tool_calls
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Drive one run to completion. Never returns an error: every failure
    /// mode ends in the message log, and the caller's drop guard clears the
    /// session's processing flag.
    pub async fn run(&self, session: &Session) {
        info!(session_id = %session.id, "Run started");
        self.activity.record(ActivityRecord::AgentEvent {
            conversation_id: session.id.clone(),
            event: "run_started".into(),
            detail: serde_json::json!({
                "model": self.model,
                "max_tool_calls": self.max_tool_calls,
                "temperature": self.temperature,
                "auth_mode": self.client.auth_mode(),
            }),
        });

        session.ensure_system_prompt(&prompts::build_system_prompt());

        let definitions = self.tools.definitions();
        let mut tool_call_count: u32 = 0;
        let mut download_cache: HashMap<(String, String), serde_json::Value> = HashMap::new();
        let mut emitted_files: HashSet<String> = HashSet::new();

        while tool_call_count < self.max_tool_calls {
            let response = match self.complete(session, definitions.clone()).await {
                Ok(r) => r,
                Err(e) => {
                    self.abort(session, &e, tool_call_count);
                    return;
                }
            };

            if response.message.tool_calls.is_empty() {
                // No tool calls: this is the final answer.
                session.push_final_assistant(&response.message.content);
                self.finish(session, reason::DONE, tool_call_count);
                return;
            }

            debug!(
                session_id = %session.id,
                count = response.message.tool_calls.len(),
                "Model requested tools"
            );

            let tool_calls = response.message.tool_calls.clone();
            let interim = response.message.content.trim().to_string();

            // The assistant turn (with its tool calls) goes to the model
            // context verbatim; its text is only surfaced when non-empty.
            session.push_context(ModelMessage {
                role: ModelRole::Assistant,
                content: response.message.content,
                tool_calls: tool_calls.clone(),
                tool_call_id: None,
            });
            if !interim.is_empty() {
                session.push_interim_assistant(&interim);
            }

            for call in &tool_calls {
                if tool_call_count >= self.max_tool_calls {
                    // Budget exhausted mid-batch: answer the remaining calls
                    // without executing them so the context stays well-formed.
                    let payload = serde_json::json!({
                        "error": "Tool call limit reached; call not executed."
                    });
                    session.push_tool_activity(
                        &call.name,
                        parse_arguments(call),
                        payload.clone(),
                        0,
                    );
                    session.push_context(ModelMessage::tool_result(&call.id, payload.to_string()));
                    continue;
                }
                tool_call_count += 1;

                let args = parse_arguments(call);
                let started = Instant::now();
                let result = self.dispatch(call, &args, &mut download_cache).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                self.activity.record(ActivityRecord::ToolCall {
                    conversation_id: session.id.clone(),
                    tool_name: call.name.clone(),
                    args: args.clone(),
                    result: result.payload.clone(),
                    duration_ms,
                });

                session.push_tool_activity(&call.name, args, result.payload.clone(), duration_ms);

                self.emit_download_artifacts(session, call, &result, &mut emitted_files);

                let result_text = truncate_for_context(&result.payload.to_string());
                session.push_context(ModelMessage::tool_result(&call.id, result_text));
            }
        }

        // Tool budget exhausted: one last turn without tool access.
        warn!(
            session_id = %session.id,
            max_tool_calls = self.max_tool_calls,
            "Tool budget exhausted, forcing final answer"
        );
        session.push_system(&format!(
            "Reached maximum of {} tool calls. Summarize your findings now.",
            self.max_tool_calls
        ));

        match self.complete(session, Vec::new()).await {
            Ok(response) => session.push_final_assistant(&response.message.content),
            Err(e) => session.push_system(&format!("Error: {e}")),
        }
        self.finish(session, reason::TOOL_LIMIT_REACHED, tool_call_count);
    }

    /// One model call, with the llm_call activity record.
    async fn complete(
        &self,
        session: &Session,
        tools: Vec<ToolDefinition>,
    ) -> Result<ModelResponse, ProviderError> {
        let request = ModelRequest {
            model: self.model.clone(),
            messages: session.context_snapshot(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        };

        let started = Instant::now();
        let result = self.client.complete(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Ok(response) = &result {
            let (prompt_tokens, completion_tokens) = response
                .usage
                .as_ref()
                .map(|u| (u.prompt_tokens, u.completion_tokens))
                .unwrap_or((0, 0));
            self.activity.record(ActivityRecord::LlmCall {
                conversation_id: session.id.clone(),
                model: response.model.clone(),
                prompt_tokens,
                completion_tokens,
                duration_ms,
                tool_call_count: response.message.tool_calls.len(),
                finish_reason: response.finish_reason.clone(),
                auth_mode: self.client.auth_mode().to_string(),
            });
        }

        result
    }

    /// Execute one tool call, deduplicating repeated downloads within the
    /// run. Failures become error payloads, never a crashed run.
    async fn dispatch(
        &self,
        call: &ModelToolCall,
        args: &serde_json::Value,
        download_cache: &mut HashMap<(String, String), serde_json::Value>,
    ) -> ToolResult {
        let download_key = (call.name == "download_file").then(|| {
            (
                args["url"].as_str().unwrap_or_default().to_string(),
                args["filename"]
                    .as_str()
                    .unwrap_or_default()
                    .to_lowercase(),
            )
        });

        if let Some(key) = &download_key {
            if let Some(cached) = download_cache.get(key) {
                let mut payload = cached.clone();
                payload["deduplicated"] = serde_json::json!(true);
                payload["deduplicated_reason"] = serde_json::json!(
                    "Skipped duplicate download_file call for identical url+filename."
                );
                return ToolResult::ok(payload);
            }
        }

        let result = match self.tools.execute(&call.name, args.clone()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failed(serde_json::json!({ "error": e.to_string() }))
            }
        };

        if let Some(key) = download_key {
            if result.success && result.payload["success"].as_bool().unwrap_or(false) {
                download_cache.insert(key, result.payload.clone());
            }
        }

        result
    }

    /// After a successful, non-deduplicated download: either a verification
    /// warning (system message) or a file message, at most once per filename.
    fn emit_download_artifacts(
        &self,
        session: &Session,
        call: &ModelToolCall,
        result: &ToolResult,
        emitted_files: &mut HashSet<String>,
    ) {
        if call.name != "download_file"
            || !result.payload["success"].as_bool().unwrap_or(false)
            || result.payload["deduplicated"].as_bool().unwrap_or(false)
        {
            return;
        }

        if let Some(warning) = verify_download(&result.payload) {
            session.push_system(&warning);
            return;
        }

        let filename = result.payload["filename"].as_str().unwrap_or_default();
        let file_key = filename.to_lowercase();
        if !file_key.is_empty() && emitted_files.insert(file_key) {
            session.push_file(
                filename,
                result.payload["path"].as_str().unwrap_or_default(),
                result.payload["size_bytes"].as_u64().unwrap_or(0),
            );
        }
    }

    fn abort(&self, session: &Session, error: &ProviderError, tool_call_count: u32) {
        warn!(session_id = %session.id, error = %error, "Run aborted");
        session.push_system(&format!("Error: {error}"));
        self.finish(session, reason::ABORTED, tool_call_count);
    }

    fn finish(&self, session: &Session, terminal: &str, tool_call_count: u32) {
        info!(session_id = %session.id, reason = terminal, "Run finished");
        self.activity.record(ActivityRecord::AgentEvent {
            conversation_id: session.id.clone(),
            event: terminal.into(),
            detail: serde_json::json!({ "tool_call_count_total": tool_call_count }),
        });
    }
}

/// Parse a tool call's argument string; malformed JSON becomes an empty map
/// so the tool can report the missing fields itself.
fn parse_arguments(call: &ModelToolCall) -> serde_json::Value {
    serde_json::from_str(&call.arguments)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
}

/// Check a download result for suspicious signals; returns the warning text.
fn verify_download(payload: &serde_json::Value) -> Option<String> {
    let mut warnings = Vec::new();
    let filename = payload["filename"].as_str().unwrap_or_default().to_lowercase();
    let size = payload["size_bytes"].as_u64().unwrap_or(0);

    if let Some((ext, min)) = MIN_SIZES.iter().find(|(ext, _)| filename.ends_with(ext)) {
        if size < *min {
            warnings.push(format!(
                "File size ({size} bytes) is suspiciously small for a {} file. Expected at \
                 least {min} bytes. The URL may have returned an error page.",
                ext.trim_start_matches('.').to_uppercase()
            ));
        }
    }

    if let Some(warning) = payload["warning"].as_str() {
        warnings.push(warning.to_string());
    }

    if warnings.is_empty() {
        None
    } else {
        Some(format!(
            "DOWNLOAD VERIFICATION WARNING:\n{}",
            warnings
                .iter()
                .map(|w| format!("- {w}"))
                .collect::<Vec<_>>()
                .join("\n")
        ))
    }
}

/// Truncate a serialized tool result for the model context.
fn truncate_for_context(serialized: &str) -> String {
    if serialized.len() <= RESULT_CONTEXT_LIMIT {
        return serialized.to_string();
    }
    let mut truncated: String = serialized.chars().take(RESULT_CONTEXT_LIMIT).collect();
    truncated.push_str("... [truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use webhound_core::error::ToolError;
    use webhound_core::message::Role;
    use webhound_core::provider::Usage;
    use webhound_core::tool::Tool;

    // --- Scripted model client ---

    struct ScriptedClient {
        script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
        /// Tool counts of every request received, in order.
        request_tool_counts: Mutex<Vec<usize>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                request_tool_counts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            self.request_tool_counts
                .lock()
                .unwrap()
                .push(request.tools.len());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text_response("All done.")))
        }
    }

    fn text_response(content: &str) -> ModelResponse {
        ModelResponse {
            message: ModelMessage::assistant(content),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            finish_reason: Some("stop".into()),
            model: "mock-model".into(),
        }
    }

    fn tool_response(content: &str, calls: Vec<(&str, &str, serde_json::Value)>) -> ModelResponse {
        let mut message = ModelMessage::assistant(content);
        message.tool_calls = calls
            .into_iter()
            .map(|(id, name, args)| ModelToolCall {
                id: id.into(),
                name: name.into(),
                arguments: args.to_string(),
            })
            .collect();
        ModelResponse {
            message,
            usage: None,
            finish_reason: Some("tool_calls".into()),
            model: "mock-model".into(),
        }
    }

    // --- Mock tools ---

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(
                serde_json::json!({"echo": arguments["text"]}),
            ))
        }
    }

    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "flaky".into(),
                reason: "simulated network error".into(),
            })
        }
    }

    /// Stand-in download tool: succeeds with the size given in the args.
    struct FakeDownloadTool;

    #[async_trait]
    impl Tool for FakeDownloadTool {
        fn name(&self) -> &str {
            "download_file"
        }
        fn description(&self) -> &str {
            "Fake download"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let filename = arguments["filename"].as_str().unwrap_or("file.bin");
            Ok(ToolResult::ok(serde_json::json!({
                "url": arguments["url"],
                "filename": filename,
                "path": format!("downloads/{filename}"),
                "size_bytes": arguments["size"].as_u64().unwrap_or(50_000),
                "success": true,
            })))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(FailTool));
        registry.register(Box::new(FakeDownloadTool));
        Arc::new(registry)
    }

    fn agent_with(
        client: Arc<dyn ModelClient>,
        activity: Arc<ActivityLog>,
        max_tool_calls: u32,
    ) -> AgentLoop {
        let config = AgentConfig {
            model: "mock-model".into(),
            max_tool_calls,
            temperature: 0.2,
            max_tokens: None,
        };
        AgentLoop::new(client, registry(), activity, &config)
    }

    async fn run_once(agent: &AgentLoop, user_text: &str) -> Arc<crate::session::Session> {
        let store = SessionStore::new();
        let session = store.create_or_get(None).await;
        session.push_user(user_text);
        agent.run(&session).await;
        session
    }

    #[tokio::test]
    async fn plain_answer_is_final() {
        let client = ScriptedClient::new(vec![Ok(text_response("The answer."))]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "question").await;

        let log = session.snapshot_since(0).messages;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[1].role, Role::Assistant);
        assert!(log[1].final_answer);
        assert_eq!(log[1].content, "The answer.");

        // System prompt was inserted ahead of the user turn
        let context = session.context_snapshot();
        assert_eq!(context[0].role, ModelRole::System);
    }

    #[tokio::test]
    async fn tool_turn_then_final() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![("c1", "echo", serde_json::json!({"text": "hi"}))],
            )),
            Ok(text_response("done")),
        ]);
        let activity = Arc::new(ActivityLog::memory());
        let agent = agent_with(client, activity.clone(), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        // user, tool_activity, final — the empty interim text is discarded
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].role, Role::ToolActivity);
        assert_eq!(log[1].tool_name.as_deref(), Some("echo"));
        assert_eq!(log[1].tool_result.as_ref().unwrap()["echo"], "hi");
        assert!(log[2].final_answer);

        // llm_call records for both turns, tool_call record in between
        let records = activity.records();
        let kinds: Vec<&str> = records
            .iter()
            .map(|r| match &r.record {
                ActivityRecord::LlmCall { .. } => "llm",
                ActivityRecord::ToolCall { .. } => "tool",
                ActivityRecord::AgentEvent { .. } => "event",
            })
            .collect();
        assert_eq!(kinds, vec!["event", "llm", "tool", "llm", "event"]);
    }

    #[tokio::test]
    async fn nonempty_interim_text_is_surfaced() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "Let me look that up.",
                vec![("c1", "echo", serde_json::json!({"text": "x"}))],
            )),
            Ok(text_response("final")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(log[1].content, "Let me look that up.");
        assert!(!log[1].final_answer);
    }

    #[tokio::test]
    async fn tool_failure_is_absorbed_and_run_continues() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![("c1", "flaky", serde_json::json!({}))],
            )),
            Ok(text_response("I could not fetch that page.")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        let activity_msg = &log[1];
        assert_eq!(activity_msg.role, Role::ToolActivity);
        let result = activity_msg.tool_result.as_ref().unwrap();
        assert!(result["error"].as_str().unwrap().contains("simulated"));

        // The run still reached a final answer
        assert!(log.last().unwrap().final_answer);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_payload() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![("c1", "telepathy", serde_json::json!({}))],
            )),
            Ok(text_response("ok")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        let result = log[1].tool_result.as_ref().unwrap();
        assert!(result["error"].as_str().unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn budget_forces_tool_free_final_turn() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![("c1", "echo", serde_json::json!({"text": "1"}))],
            )),
            Ok(text_response("forced summary")),
        ]);
        let activity = Arc::new(ActivityLog::memory());
        let agent = agent_with(client.clone(), activity.clone(), 1);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        // user, tool_activity, system (budget notice), final assistant
        assert_eq!(log.len(), 4);
        assert_eq!(log[2].role, Role::System);
        assert!(log[2].content.contains("maximum of 1 tool calls"));
        assert!(log[3].final_answer);
        assert_eq!(log[3].content, "forced summary");

        // The forced turn went out without tool access
        let counts = client.request_tool_counts.lock().unwrap().clone();
        assert_eq!(*counts.last().unwrap(), 0);

        // Terminal activity reason
        let has_limit_event = activity.records().iter().any(|r| {
            matches!(&r.record, ActivityRecord::AgentEvent { event, .. }
                if event == reason::TOOL_LIMIT_REACHED)
        });
        assert!(has_limit_event);
    }

    #[tokio::test]
    async fn budget_never_exceeded_mid_batch() {
        // One response asks for two calls but the budget allows one.
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![
                    ("c1", "echo", serde_json::json!({"text": "a"})),
                    ("c2", "echo", serde_json::json!({"text": "b"})),
                ],
            )),
            Ok(text_response("forced")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 1);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        let executed: Vec<_> = log
            .iter()
            .filter(|m| m.role == Role::ToolActivity)
            .collect();
        assert_eq!(executed.len(), 2);
        // First executed, second answered without execution
        assert_eq!(executed[0].tool_result.as_ref().unwrap()["echo"], "a");
        assert!(
            executed[1].tool_result.as_ref().unwrap()["error"]
                .as_str()
                .unwrap()
                .contains("limit")
        );
    }

    #[tokio::test]
    async fn download_emits_file_message_once() {
        let dl = |id: &'static str| {
            (
                id,
                "download_file",
                serde_json::json!({"url": "https://x.example/r.pdf", "filename": "r.pdf", "size": 50_000}),
            )
        };
        let client = ScriptedClient::new(vec![
            Ok(tool_response("", vec![dl("c1"), dl("c2")])),
            Ok(text_response("done")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        let files: Vec<_> = log.iter().filter(|m| m.role == Role::File).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename.as_deref(), Some("r.pdf"));

        // The second identical call was served from the dedup cache
        let activities: Vec<_> = log
            .iter()
            .filter(|m| m.role == Role::ToolActivity)
            .collect();
        assert_eq!(activities.len(), 2);
        let second = activities[1].tool_result.as_ref().unwrap();
        assert_eq!(second["deduplicated"], true);
        assert!(second["deduplicated_reason"].is_string());
    }

    #[tokio::test]
    async fn suspiciously_small_download_warns_instead_of_file_message() {
        let client = ScriptedClient::new(vec![
            Ok(tool_response(
                "",
                vec![(
                    "c1",
                    "download_file",
                    serde_json::json!({"url": "https://x.example/t.pdf", "filename": "t.pdf", "size": 900}),
                )],
            )),
            Ok(text_response("done")),
        ]);
        let agent = agent_with(client, Arc::new(ActivityLog::memory()), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        assert!(!log.iter().any(|m| m.role == Role::File));
        let warning = log
            .iter()
            .find(|m| m.role == Role::System)
            .expect("verification warning expected");
        assert!(warning.content.contains("DOWNLOAD VERIFICATION WARNING"));
        assert!(warning.content.contains("suspiciously small"));
    }

    #[tokio::test]
    async fn provider_failure_aborts_with_system_message() {
        let client = ScriptedClient::new(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]);
        let activity = Arc::new(ActivityLog::memory());
        let agent = agent_with(client, activity.clone(), 10);
        let session = run_once(&agent, "go").await;

        let log = session.snapshot_since(0).messages;
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].role, Role::System);
        assert!(log[1].content.contains("connection refused"));
        assert!(!log.iter().any(|m| m.final_answer));

        let has_abort = activity.records().iter().any(|r| {
            matches!(&r.record, ActivityRecord::AgentEvent { event, .. }
                if event == reason::ABORTED)
        });
        assert!(has_abort);
    }

    #[tokio::test]
    async fn start_run_rejects_concurrent_and_clears_flag() {
        // A client that parks until released, so the first run stays active.
        struct ParkedClient {
            release: tokio::sync::Notify,
        }

        #[async_trait]
        impl ModelClient for ParkedClient {
            fn name(&self) -> &str {
                "parked"
            }
            async fn complete(
                &self,
                _request: ModelRequest,
            ) -> Result<ModelResponse, ProviderError> {
                self.release.notified().await;
                Ok(text_response("late answer"))
            }
        }

        let client = Arc::new(ParkedClient {
            release: tokio::sync::Notify::new(),
        });
        let agent = Arc::new(AgentLoop::new(
            client.clone(),
            registry(),
            Arc::new(ActivityLog::memory()),
            &AgentConfig::default(),
        ));

        let store = SessionStore::new();
        let session = store.create_or_get(None).await;

        store
            .start_run(session.clone(), "first", agent.clone())
            .expect("first run accepted");
        assert!(session.is_processing());

        let before = session.snapshot_since(0).total_messages;
        let err = store
            .start_run(session.clone(), "second", agent.clone())
            .unwrap_err();
        assert_eq!(err, webhound_core::error::SessionError::AlreadyProcessing);
        // The rejected request appended nothing
        assert_eq!(session.snapshot_since(0).total_messages, before);

        client.release.notify_one();
        for _ in 0..200 {
            if !session.is_processing() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!session.is_processing());
        assert!(session.snapshot_since(0).messages.last().unwrap().final_answer);
    }

    #[test]
    fn verify_download_flags_small_files_and_warnings() {
        let payload = serde_json::json!({"filename": "a.pdf", "size_bytes": 100});
        assert!(verify_download(&payload).unwrap().contains("suspiciously"));

        let payload = serde_json::json!({"filename": "a.pdf", "size_bytes": 100_000});
        assert!(verify_download(&payload).is_none());

        let payload = serde_json::json!({
            "filename": "a.xlsx", "size_bytes": 100_000,
            "warning": "File does not appear to be a valid Excel file"
        });
        assert!(verify_download(&payload).unwrap().contains("Excel"));
    }

    #[test]
    fn context_truncation_is_bounded() {
        let long = "x".repeat(RESULT_CONTEXT_LIMIT + 100);
        let truncated = truncate_for_context(&long);
        assert!(truncated.ends_with("... [truncated]"));
        assert!(truncated.len() < long.len());

        let short = "short".to_string();
        assert_eq!(truncate_for_context(&short), "short");
    }
}
