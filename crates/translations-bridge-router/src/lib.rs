//! Cross-context message router for the translations bridge
//!
//! Content frames and the background translation context never talk to
//! each other directly. Every envelope goes through the [`EngineRouter`],
//! which answers `getModels` itself, injects frame traffic into the single
//! background context and relays background traffic to the frame named by
//! `innerWindowId`, looked up in the [`FrameRegistry`]. Hosts submit
//! envelopes through an [`OrderedDispatcher`] to keep them in arrival order.

pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod frame;
pub mod message;

pub use context::{
    script_call, BackgroundContext, ContentFrame, FrameHandle, BACKGROUND_POST_MESSAGE,
    FORWARD_TO_CONTENT, PORT_POST_MESSAGE,
};
pub use dispatch::OrderedDispatcher;
pub use engine::{EngineRouter, EngineStatus, Origin, RelayOutcome};
pub use error::{RouterError, RouterResult, ScriptError, MALFORMED_MESSAGE, UNAVAILABLE_MESSAGE};
pub use frame::FrameRegistry;
pub use message::{GetModelsRequest, InboundCommand, RelayPayload, Reply, ReplyChannel};
