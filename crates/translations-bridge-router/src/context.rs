//! Script execution capabilities
//!
//! The router never runs scripts itself. It hands serialized calls such as
//! `backgroundPostMessage({...})` to whatever evaluates them: the hidden
//! background context, or a content frame.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{RouterResult, ScriptError};

/// Background entry point for payloads forwarded from content frames
pub const BACKGROUND_POST_MESSAGE: &str = "backgroundPostMessage";

/// Background entry point for messages posted on its message port
pub const PORT_POST_MESSAGE: &str = "portPostMessage";

/// Content frame entry point for relayed payloads
pub const FORWARD_TO_CONTENT: &str = "forwardMessageToContent";

/// The single long-lived background execution context
#[async_trait]
pub trait BackgroundContext: Send + Sync {
    /// Bring the context up; called once before any evaluation
    async fn load(&self) -> Result<(), ScriptError>;

    /// Evaluate one serialized call
    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError>;
}

/// A content frame able to evaluate calls in its script context
#[async_trait]
pub trait ContentFrame: Send + Sync {
    /// Evaluate one serialized call
    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError>;
}

/// Shared handle to a content frame, owned by the host
pub type FrameHandle = Arc<dyn ContentFrame>;

/// Build `function(<payload as JSON>)`
pub fn script_call(function: &str, payload: &Value) -> RouterResult<String> {
    Ok(format!("{}({})", function, serde_json::to_string(payload)?))
}
