//! Tool trait and registry — the agent's capabilities.
//!
//! The registry is a closed lookup table from tool name to executor. An
//! unknown name is an error value, never a panic; the agent loop turns it
//! into a result payload the model can read.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The outcome of a tool execution.
///
/// `payload` is the structured value recorded in the message log and fed
/// back to the model. Failed executions set `success = false` and carry an
/// "error" key in the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub payload: serde_json::Value,
}

impl ToolResult {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn failed(payload: serde_json::Value) -> Self {
        Self {
            success: false,
            payload,
        }
    }
}

/// One executable capability (search, scrape_page, download_file).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model calls this tool by.
    fn name(&self) -> &str;

    /// What this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with the given (already-parsed) arguments.
    ///
    /// Backend failures the model should see (HTTP errors, bad targets)
    /// return `Ok` with a failed [`ToolResult`]; `Err` is reserved for
    /// malformed arguments and registry-level problems.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// This tool's schema for the model request.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A closed registry of the known tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool schemas, for the model request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Dispatch one call. Unknown names are `ToolError::NotFound`.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
