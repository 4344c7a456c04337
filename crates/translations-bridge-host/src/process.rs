//! Background context hosted in a child process
//!
//! The child reads `{"call": ...}` and `{"reply": ...}` lines on stdin and
//! writes `{"ready": true}` once, followed by `{"id": ..., "message": ...}`
//! lines for every envelope it sends back to the router.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use translations_bridge_router::{BackgroundContext, Reply, ScriptError};

use crate::config::EngineConfig;
use crate::protocol::{write_json_line, ChildInput, ChildLine};

/// Capacity of the queue of requests raised by the child
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// An envelope raised by the background process
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundRequest {
    /// Correlation id chosen by the child, echoed in the reply
    pub id: Value,
    pub envelope: Value,
}

/// [`BackgroundContext`] backed by a spawned program
pub struct ProcessContext {
    config: EngineConfig,
    requests: mpsc::Sender<BackgroundRequest>,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
}

impl ProcessContext {
    /// Create the context and the stream of requests the child will raise
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<BackgroundRequest>) {
        let (requests, receiver) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let context = Self {
            config,
            requests,
            stdin: Mutex::new(None),
            child: Mutex::new(None),
        };
        (context, receiver)
    }

    /// Answer a request raised by the child
    pub async fn reply(&self, id: Value, reply: &Reply) -> anyhow::Result<()> {
        let message = reply.to_value()?;
        self.write(&ChildInput::Reply {
            reply: &id,
            message,
        })
        .await
        .map_err(|e| anyhow::anyhow!("failed to reply to background process: {}", e))
    }

    /// Stop the child if it is still running
    pub async fn shutdown(&self) {
        self.stdin.lock().await.take();
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!("Background process already gone: {}", e);
            }
        }
    }

    async fn write(&self, line: &ChildInput<'_>) -> Result<(), ScriptError> {
        let mut stdin = self.stdin.lock().await;
        let writer = stdin
            .as_mut()
            .ok_or_else(|| ScriptError::ContextLost("background process is not running".into()))?;

        write_json_line(writer, line)
            .await
            .map_err(|e| ScriptError::ContextLost(e.to_string()))
    }

    async fn wait_ready(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<(), ScriptError> {
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| ScriptError::LoadFailed(e.to_string()))?
                .ok_or_else(|| {
                    ScriptError::LoadFailed("background process exited before ready".into())
                })?;

            match serde_json::from_str::<ChildLine>(&line) {
                Ok(ChildLine::Ready { ready: true }) => return Ok(()),
                Ok(_) => debug!("Ignoring output before ready: {}", line),
                Err(e) => debug!("Ignoring unparsable output: {}", e),
            }
        }
    }
}

/// Forward every request line until the child closes stdout
async fn pump_requests(
    mut lines: Lines<BufReader<ChildStdout>>,
    requests: mpsc::Sender<BackgroundRequest>,
) {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("Background process closed its output");
                return;
            }
            Err(e) => {
                warn!("Failed to read background process output: {}", e);
                return;
            }
        };

        match serde_json::from_str::<ChildLine>(&line) {
            Ok(ChildLine::Request { id, message }) => {
                let request = BackgroundRequest {
                    id,
                    envelope: message,
                };
                if requests.send(request).await.is_err() {
                    return;
                }
            }
            Ok(ChildLine::Ready { .. }) => debug!("Ignoring repeated ready line"),
            Err(e) => warn!("Ignoring malformed background line: {}", e),
        }
    }
}

#[async_trait]
impl BackgroundContext for ProcessContext {
    async fn load(&self) -> Result<(), ScriptError> {
        info!(command = %self.config.command, "Spawning background process");

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScriptError::LoadFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScriptError::LoadFailed("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScriptError::LoadFailed("child stdout unavailable".into()))?;

        let mut lines = BufReader::new(stdout).lines();
        let timeout = Duration::from_secs(self.config.ready_timeout_seconds);
        tokio::time::timeout(timeout, Self::wait_ready(&mut lines))
            .await
            .map_err(|_| {
                ScriptError::LoadFailed(format!(
                    "background process not ready after {}s",
                    self.config.ready_timeout_seconds
                ))
            })??;

        *self.stdin.lock().await = Some(stdin);
        *self.child.lock().await = Some(child);
        tokio::spawn(pump_requests(lines, self.requests.clone()));

        info!("Background process ready");
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError> {
        self.write(&ChildInput::Call { call: script }).await?;
        Ok(Value::Null)
    }
}
