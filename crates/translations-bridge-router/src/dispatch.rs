//! Arrival-order dispatch of envelopes
//!
//! Relay and forward envelopes are handled one at a time per origin side, in
//! the order they were submitted, so a frame sees relays in the order the
//! background sent them and the background sees forwards in the order frames
//! sent them. `getModels` can take as long as a download batch and runs on
//! its own task.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{EngineRouter, Origin};
use crate::error::{RouterError, UNAVAILABLE_MESSAGE};
use crate::message::{Reply, ReplyChannel};

struct Submission {
    origin: Origin,
    envelope: Value,
    reply: ReplyChannel,
}

/// Submits envelopes to an [`EngineRouter`] without reordering them
#[derive(Clone)]
pub struct OrderedDispatcher {
    router: EngineRouter,
    from_frames: mpsc::UnboundedSender<Submission>,
    from_background: mpsc::UnboundedSender<Submission>,
}

impl OrderedDispatcher {
    /// Start the two ordered lanes on the current runtime
    pub fn new(router: EngineRouter) -> Self {
        Self {
            from_frames: spawn_lane(router.clone(), "frames"),
            from_background: spawn_lane(router.clone(), "background"),
            router,
        }
    }

    pub fn router(&self) -> &EngineRouter {
        &self.router
    }

    /// Queue one envelope; its reply arrives on `reply`
    ///
    /// Must be called in arrival order; calls return without waiting for
    /// the envelope to be handled.
    pub fn submit(&self, origin: Origin, envelope: Value, reply: ReplyChannel) {
        if is_get_models(&envelope) {
            let router = self.router.clone();
            tokio::spawn(async move { router.handle_request(origin, envelope, reply).await });
            return;
        }

        let lane = match origin {
            Origin::Frame(_) => &self.from_frames,
            Origin::Background => &self.from_background,
        };
        if let Err(mpsc::error::SendError(submission)) = lane.send(Submission {
            origin,
            envelope,
            reply,
        }) {
            warn!("Dispatch lane closed, rejecting envelope");
            let err = RouterError::EngineUnavailable(UNAVAILABLE_MESSAGE.to_string());
            submission.reply.send(Reply::from_error(&err));
        }
    }
}

fn is_get_models(envelope: &Value) -> bool {
    envelope.get("type").and_then(Value::as_str) == Some("getModels")
}

fn spawn_lane(router: EngineRouter, name: &'static str) -> mpsc::UnboundedSender<Submission> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Submission>();
    tokio::spawn(async move {
        while let Some(submission) = receiver.recv().await {
            router
                .handle_request(submission.origin, submission.envelope, submission.reply)
                .await;
        }
        debug!(lane = name, "Dispatch lane stopped");
    });
    sender
}
