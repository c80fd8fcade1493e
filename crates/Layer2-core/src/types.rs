//! Shared types for the loop, hooks and call recording

use chrono::{DateTime, Utc};
use forgeloop_foundation::LoopAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// AgentLoopResult
// ============================================================================

/// What a step function returns from one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLoopResult {
    pub action: LoopAction,

    /// Payload carried into the termination on `Terminate`.
    pub result: Option<Value>,

    /// Prompt for the next iteration, if the step wants to steer it.
    pub next_prompt: Option<String>,
}

impl AgentLoopResult {
    /// Keep looping.
    pub fn next() -> Self {
        Self {
            action: LoopAction::Continue,
            result: None,
            next_prompt: None,
        }
    }

    /// Keep looping with a prompt for the next iteration.
    pub fn next_with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            next_prompt: Some(prompt.into()),
            ..Self::next()
        }
    }

    /// Stop successfully with a result payload.
    pub fn terminate(result: Value) -> Self {
        Self {
            action: LoopAction::Terminate,
            result: Some(result),
            next_prompt: None,
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.action == LoopAction::Terminate
    }
}

// ============================================================================
// Model calls
// ============================================================================

/// Token usage reported by a model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A request handed to a model client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub metadata: Value,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A normalized model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub usage: ModelUsage,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>, usage: ModelUsage) -> Self {
        Self {
            content: content.into(),
            usage,
        }
    }
}

// ============================================================================
// Tool calls
// ============================================================================

/// A tool invocation requested by the step function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of a successful tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: Value,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl ToolOutput {
    pub fn new(call_id: impl Into<String>, content: Value, duration_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            content,
            duration_ms,
            completed_at: Utc::now(),
        }
    }
}
