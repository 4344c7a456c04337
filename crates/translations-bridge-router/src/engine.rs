//! Background engine router
//!
//! `EngineRouter` owns the single background context. Every call into that
//! context goes through one evaluation lock, so no two evaluations are ever
//! in flight. Calls issued while the context is still loading are queued and
//! replayed in order once it is ready.
//!
//! ```text
//! Uninitialized --start--> Loading --load ok--> Ready
//!                             |                   |
//!                         load failed        context lost
//!                             v                   v
//!                          Faulted <--------------+
//! ```

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, instrument, warn};
use translations_bridge_core::{FrameId, ModelKey};
use translations_bridge_service::{ModelManager, TransportPayload};

use crate::context::{
    script_call, BackgroundContext, FrameHandle, BACKGROUND_POST_MESSAGE, FORWARD_TO_CONTENT,
    PORT_POST_MESSAGE,
};
use crate::error::{RouterError, RouterResult, ScriptError};
use crate::frame::FrameRegistry;
use crate::message::{GetModelsRequest, InboundCommand, RelayPayload, Reply, ReplyChannel};

/// Observable lifecycle of the background context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Loading,
    Ready,
    Faulted(String),
}

/// Who an envelope came from
#[derive(Clone)]
pub enum Origin {
    /// A content frame
    Frame(FrameHandle),
    /// The background context itself
    Background,
}

/// Result of a relay to a content frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The frame evaluated the call
    Delivered,
    /// No live frame is registered under the target id
    Dropped,
    /// The frame was found but the evaluation failed
    Failed,
}

struct PendingCall {
    script: String,
    done: oneshot::Sender<RouterResult<Value>>,
}

enum Dispatch {
    Queued(oneshot::Receiver<RouterResult<Value>>),
    Immediate(String),
}

enum EngineState {
    Uninitialized,
    Loading(VecDeque<PendingCall>),
    Ready,
    Faulted(String),
}

struct EngineInner {
    context: Arc<dyn BackgroundContext>,
    models: Arc<ModelManager>,
    frames: Arc<FrameRegistry>,
    state: Mutex<EngineState>,
    eval_lock: Mutex<()>,
}

/// Routes envelopes between content frames, the background context and the
/// model manager
#[derive(Clone)]
pub struct EngineRouter {
    inner: Arc<EngineInner>,
}

impl EngineRouter {
    /// Create a router; the context is not loaded until [`EngineRouter::start`]
    pub fn new(
        context: Arc<dyn BackgroundContext>,
        models: Arc<ModelManager>,
        frames: Arc<FrameRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                context,
                models,
                frames,
                state: Mutex::new(EngineState::Uninitialized),
                eval_lock: Mutex::new(()),
            }),
        }
    }

    pub fn frames(&self) -> &Arc<FrameRegistry> {
        &self.inner.frames
    }

    pub fn models(&self) -> &Arc<ModelManager> {
        &self.inner.models
    }

    /// Current lifecycle state
    pub async fn status(&self) -> EngineStatus {
        match &*self.inner.state.lock().await {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Loading(_) => EngineStatus::Loading,
            EngineState::Ready => EngineStatus::Ready,
            EngineState::Faulted(reason) => EngineStatus::Faulted(reason.clone()),
        }
    }

    /// Begin loading the background context
    ///
    /// Only the first call has any effect; the context is never recreated.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        self.begin_loading(&mut state);
    }

    /// Handle one envelope and write exactly one reply
    #[instrument(skip_all)]
    pub async fn handle_request(&self, origin: Origin, envelope: Value, reply: ReplyChannel) {
        let command = match InboundCommand::decode(envelope) {
            Ok(command) => command,
            Err(e) => {
                warn!("Rejecting malformed envelope: {}", e);
                reply.send(Reply::from_error(&e));
                return;
            }
        };

        let name = command.name();
        debug!(command = name, "Dispatching command");

        let result = self.dispatch(origin, command).await;
        match result {
            Ok(response) => reply.send(response),
            Err(e) => {
                warn!(command = name, "Command failed: {}", e);
                reply.send(Reply::from_error(&e));
            }
        }
    }

    async fn dispatch(&self, origin: Origin, command: InboundCommand) -> RouterResult<Reply> {
        match (command, origin) {
            (InboundCommand::GetModels(request), origin) => {
                if let (Origin::Frame(frame), Some(id)) = (&origin, &request.inner_window_id) {
                    self.inner.frames.register(Some(frame), id.clone()).await;
                }
                self.get_models(request).await.map(Reply::Models)
            }
            (InboundCommand::Forward(payload), Origin::Frame(frame)) => {
                self.forward_from_frame(&frame, payload).await?;
                Ok(Reply::Done)
            }
            (InboundCommand::Port(payload), Origin::Frame(frame)) => {
                self.inner
                    .frames
                    .register(Some(&frame), payload.inner_window_id().clone())
                    .await;
                self.post_to_port(&payload.to_value()).await?;
                Ok(Reply::Done)
            }
            (InboundCommand::Forward(payload), Origin::Background)
            | (InboundCommand::Port(payload), Origin::Background)
            | (InboundCommand::Background(payload), _) => {
                let target = payload.inner_window_id().clone();
                match self.handle_relay(&target, payload.to_value()).await {
                    RelayOutcome::Delivered => Ok(Reply::Done),
                    RelayOutcome::Dropped => Err(RouterError::EngineUnavailable(format!(
                        "no live frame registered as {}",
                        target
                    ))),
                    RelayOutcome::Failed => Err(RouterError::EngineUnavailable(format!(
                        "frame {} failed to evaluate the relay",
                        target
                    ))),
                }
            }
        }
    }

    async fn get_models(&self, request: GetModelsRequest) -> RouterResult<TransportPayload> {
        let models = &self.inner.models;
        let version = request
            .version
            .unwrap_or_else(|| models.default_version().to_string());
        let key = ModelKey::new(request.source_language, request.target_language, version);

        Ok(models.fetch_transport_payload(key).await?)
    }

    /// Relay a payload to the content frame registered as `target`
    ///
    /// An unknown or dropped target is logged and dropped. Relays to the same
    /// frame are evaluated in submission order.
    #[instrument(skip(self, payload), fields(frame = %target))]
    pub async fn handle_relay(&self, target: &FrameId, payload: Value) -> RelayOutcome {
        let Some(live) = self.inner.frames.resolve(target).await else {
            info!("Dropping relay for unknown frame");
            return RelayOutcome::Dropped;
        };

        let script = match script_call(FORWARD_TO_CONTENT, &payload) {
            Ok(script) => script,
            Err(e) => {
                warn!("Failed to serialize relay payload: {}", e);
                return RelayOutcome::Failed;
            }
        };

        let _order = live.order.lock().await;
        match live.frame.evaluate(&script).await {
            Ok(_) => {
                debug!("Relay delivered");
                RelayOutcome::Delivered
            }
            Err(e) => {
                warn!("Frame failed to evaluate relay: {}", e);
                RelayOutcome::Failed
            }
        }
    }

    /// Register the sending frame under the payload's `innerWindowId` and
    /// inject the payload into the background context
    #[instrument(skip(self, frame, payload), fields(frame = %payload.inner_window_id()))]
    pub async fn forward_from_frame(
        &self,
        frame: &FrameHandle,
        payload: RelayPayload,
    ) -> RouterResult<Value> {
        self.inner
            .frames
            .register(Some(frame), payload.inner_window_id().clone())
            .await;

        let script = script_call(BACKGROUND_POST_MESSAGE, &payload.to_value())?;
        self.evaluate_in_background(script).await
    }

    /// Post a message on the background context's message port
    pub async fn post_to_port(&self, payload: &Value) -> RouterResult<Value> {
        let script = script_call(PORT_POST_MESSAGE, payload)?;
        self.evaluate_in_background(script).await
    }

    /// Evaluate one call in the background context, queueing it while loading
    pub async fn evaluate_in_background(&self, script: String) -> RouterResult<Value> {
        let dispatch = {
            let mut state = self.inner.state.lock().await;
            if matches!(*state, EngineState::Uninitialized) {
                self.begin_loading(&mut state);
            }

            match &mut *state {
                EngineState::Loading(queue) => {
                    let (done, wait) = oneshot::channel();
                    queue.push_back(PendingCall { script, done });
                    debug!(queued = queue.len(), "Queued call until the background context is ready");
                    Dispatch::Queued(wait)
                }
                EngineState::Ready => Dispatch::Immediate(script),
                EngineState::Faulted(reason) => {
                    return Err(RouterError::EngineUnavailable(reason.clone()))
                }
                EngineState::Uninitialized => {
                    return Err(RouterError::EngineUnavailable(
                        "background context not started".to_string(),
                    ))
                }
            }
        };

        match dispatch {
            Dispatch::Queued(wait) => wait.await.unwrap_or_else(|_| {
                Err(RouterError::EngineUnavailable(
                    "background load task ended".to_string(),
                ))
            }),
            Dispatch::Immediate(script) => {
                let _eval = self.inner.eval_lock.lock().await;
                self.inner.evaluate(&script).await
            }
        }
    }

    fn begin_loading(&self, state: &mut EngineState) {
        if !matches!(state, EngineState::Uninitialized) {
            return;
        }
        *state = EngineState::Loading(VecDeque::new());
        info!("Loading background context");

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.load_and_replay().await });
    }
}

impl EngineInner {
    async fn evaluate(&self, script: &str) -> RouterResult<Value> {
        match self.context.evaluate(script).await {
            Ok(value) => Ok(value),
            Err(ScriptError::ContextLost(reason)) => {
                error!("Background context lost: {}", reason);
                self.fault(reason.clone()).await;
                Err(RouterError::EngineUnavailable(reason))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Enter `Faulted`, failing every call still queued
    async fn fault(&self, reason: String) {
        let previous = std::mem::replace(
            &mut *self.state.lock().await,
            EngineState::Faulted(reason.clone()),
        );
        if let EngineState::Loading(queue) = previous {
            for call in queue {
                let _ = call
                    .done
                    .send(Err(RouterError::EngineUnavailable(reason.clone())));
            }
        }
    }

    /// Holds the evaluation lock from load until the queue is drained, so
    /// calls issued after `Ready` cannot overtake queued ones.
    async fn load_and_replay(&self) {
        let _eval = self.eval_lock.lock().await;

        if let Err(e) = self.context.load().await {
            error!("Background context failed to load: {}", e);
            self.fault(e.to_string()).await;
            return;
        }

        loop {
            let next = {
                let mut state = self.state.lock().await;
                let popped = match &mut *state {
                    EngineState::Loading(queue) => Some(queue.pop_front()),
                    _ => None,
                };
                match popped {
                    Some(Some(call)) => call,
                    Some(None) => {
                        *state = EngineState::Ready;
                        info!("Background context ready");
                        return;
                    }
                    None => {
                        warn!("Background context faulted while replaying queued calls");
                        return;
                    }
                }
            };

            let result = self.evaluate(&next.script).await;
            let _ = next.done.send(result);
        }
    }
}
