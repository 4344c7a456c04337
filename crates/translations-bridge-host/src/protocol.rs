//! Line-delimited JSON protocol
//!
//! Content frames, on the host's stdin and stdout:
//!
//! ```text
//! in   {"frame": "tab-3", "message": {"type": "getModels", "payload": {...}}}
//! in   {"frame": "tab-3", "closed": true}
//! out  {"frame": "tab-3", "reply": <reply>}
//! out  {"frame": "tab-3", "eval": "forwardMessageToContent({...})"}
//! ```
//!
//! Background process, on the child's stdin and stdout:
//!
//! ```text
//! out  {"call": "backgroundPostMessage({...})"}
//! out  {"reply": 7, "message": <reply>}
//! in   {"ready": true}
//! in   {"id": 7, "message": {"type": "forward", "payload": {...}}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use translations_bridge_router::{ContentFrame, ScriptError};

/// A line from a content surface
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameLine {
    pub frame: String,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub closed: bool,
}

/// A line to a content surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput<'a> {
    pub frame: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval: Option<&'a str>,
}

/// A line from the background process
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChildLine {
    Request { id: Value, message: Value },
    Ready { ready: bool },
}

/// A line to the background process
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChildInput<'a> {
    Call { call: &'a str },
    Reply { reply: &'a Value, message: Value },
}

/// Serialize `value` as one line and flush
pub async fn write_json_line<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Shared, line-atomic writer
pub struct LineSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub async fn send<T: Serialize + Sync>(&self, value: &T) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        write_json_line(&mut *writer, value).await
    }
}

/// Content surface reached through the host's stdout
pub struct StdioFrame<W> {
    surface: String,
    sink: Arc<LineSink<W>>,
}

impl<W: AsyncWrite + Unpin + Send> StdioFrame<W> {
    pub fn new(surface: impl Into<String>, sink: Arc<LineSink<W>>) -> Self {
        Self {
            surface: surface.into(),
            sink,
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> ContentFrame for StdioFrame<W> {
    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError> {
        let line = FrameOutput {
            frame: &self.surface,
            reply: None,
            eval: Some(script),
        };
        self.sink
            .send(&line)
            .await
            .map_err(|e| ScriptError::ContextLost(e.to_string()))?;
        Ok(Value::Null)
    }
}
