//! Router integration tests
//!
//! Envelopes from content frames and the background context routed through
//! an `EngineRouter` backed by the real model pipeline.

mod common;

use async_trait::async_trait;
use serde_json::{json, Value};
use common::fixtures::{language_pair, records};
use common::TestPipeline;
use std::sync::{Arc, Mutex};
use translations_bridge_core::FrameId;
use translations_bridge_router::{
    BackgroundContext, ContentFrame, EngineRouter, FrameHandle, FrameRegistry, OrderedDispatcher,
    Origin, RelayOutcome, Reply, ReplyChannel, ScriptError, MALFORMED_MESSAGE,
    UNAVAILABLE_MESSAGE,
};

fn sequence_numbers(scripts: &[String]) -> Vec<u64> {
    scripts
        .iter()
        .map(|script| {
            let start = script.find('(').unwrap() + 1;
            let payload: Value = serde_json::from_str(&script[start..script.len() - 1]).unwrap();
            payload["n"].as_u64().unwrap()
        })
        .collect()
}

#[derive(Default)]
struct Recorder {
    scripts: Mutex<Vec<String>>,
}

impl Recorder {
    fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackgroundContext for Recorder {
    async fn load(&self) -> Result<(), ScriptError> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(Value::Null)
    }
}

#[async_trait]
impl ContentFrame for Recorder {
    async fn evaluate(&self, script: &str) -> Result<Value, ScriptError> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(Value::Null)
    }
}

struct Harness {
    pipeline: TestPipeline,
    background: Arc<Recorder>,
    router: EngineRouter,
}

async fn harness() -> Harness {
    let files = language_pair("en", "fr", "1.0");
    let pipeline = TestPipeline::new(records(&files)).await;
    pipeline.serve(&files).await;

    let background = Arc::new(Recorder::default());
    let router = EngineRouter::new(
        background.clone(),
        pipeline.manager.clone(),
        Arc::new(FrameRegistry::new()),
    );
    router.start().await;

    Harness {
        pipeline,
        background,
        router,
    }
}

async fn request(router: &EngineRouter, origin: Origin, envelope: Value) -> Reply {
    let (channel, receiver) = ReplyChannel::new();
    router.handle_request(origin, envelope, channel).await;
    receiver.await.unwrap()
}

#[tokio::test]
async fn test_get_models_from_frame() {
    let h = harness().await;
    let frame = Arc::new(Recorder::default());
    let handle: FrameHandle = frame.clone();

    let reply = request(
        &h.router,
        Origin::Frame(handle),
        json!({
            "type": "getModels",
            "payload": {"fromLanguage": "en", "toLanguage": "fr", "innerWindowId": "tab-1"}
        }),
    )
    .await;

    let Reply::Models(payload) = reply else {
        panic!("expected models, got {:?}", reply);
    };
    assert_eq!(payload.language_model_files.len(), 3);
    assert_eq!(h.pipeline.manager.download_batches(), 1);
    assert!(h.router.frames().lookup(&FrameId::from("tab-1")).await.is_some());
}

#[tokio::test]
async fn test_get_models_failure_is_generic() {
    let h = harness().await;

    let reply = request(
        &h.router,
        Origin::Background,
        json!({"type": "getModels", "payload": {"sourceLanguage": "en", "targetLanguage": "ja"}}),
    )
    .await;

    assert_eq!(
        reply,
        Reply::Error {
            error: UNAVAILABLE_MESSAGE.to_string()
        }
    );
    assert_eq!(h.pipeline.request_count().await, 0);
}

#[tokio::test]
async fn test_frame_round_trip_through_background() {
    let h = harness().await;
    let frame = Arc::new(Recorder::default());
    let handle: FrameHandle = frame.clone();
    h.router.frames().register(Some(&handle), "tab-2").await;

    let forwarded = request(
        &h.router,
        Origin::Frame(handle.clone()),
        json!({"type": "forward", "payload": {"innerWindowId": "tab-2", "text": "Hello"}}),
    )
    .await;
    assert_eq!(forwarded, Reply::Done);
    assert_eq!(
        h.background.scripts(),
        vec![r#"backgroundPostMessage({"innerWindowId":"tab-2","text":"Hello"})"#.to_string()]
    );

    let relayed = request(
        &h.router,
        Origin::Background,
        json!({"type": "port", "payload": {"innerWindowId": "tab-2", "text": "Bonjour"}}),
    )
    .await;
    assert_eq!(relayed, Reply::Done);
    assert_eq!(
        frame.scripts(),
        vec![r#"forwardMessageToContent({"innerWindowId":"tab-2","text":"Bonjour"})"#.to_string()]
    );
}

#[tokio::test]
async fn test_relay_to_dropped_frame_is_discarded() {
    let h = harness().await;
    let frame: FrameHandle = Arc::new(Recorder::default());
    h.router.frames().register(Some(&frame), "tab-3").await;
    assert_eq!(h.router.frames().len().await, 1);

    drop(frame);

    assert!(h.router.frames().lookup(&FrameId::from("tab-3")).await.is_none());
    assert!(h.router.frames().is_empty().await);
    assert_eq!(
        h.router
            .handle_relay(&FrameId::from("tab-3"), json!({"innerWindowId": "tab-3"}))
            .await,
        RelayOutcome::Dropped
    );

    let reply = request(
        &h.router,
        Origin::Background,
        json!({"type": "background", "payload": {"innerWindowId": "tab-3"}}),
    )
    .await;
    assert_eq!(
        reply,
        Reply::Error {
            error: UNAVAILABLE_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_envelope_gets_one_reply() {
    let h = harness().await;

    let reply = request(&h.router, Origin::Background, json!({"type": "translate"})).await;

    assert_eq!(
        reply,
        Reply::Error {
            error: MALFORMED_MESSAGE.to_string()
        }
    );
    assert!(h.background.scripts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatcher_keeps_arrival_order_per_side() {
    let h = harness().await;
    let frame = Arc::new(Recorder::default());
    let handle: FrameHandle = frame.clone();
    h.router.frames().register(Some(&handle), "w1").await;
    let dispatcher = OrderedDispatcher::new(h.router.clone());

    let mut replies = Vec::new();
    for n in 0..200u64 {
        let (relay, relay_reply) = ReplyChannel::new();
        dispatcher.submit(
            Origin::Background,
            json!({"type": "port", "payload": {"innerWindowId": "w1", "n": n}}),
            relay,
        );
        let (forward, forward_reply) = ReplyChannel::new();
        dispatcher.submit(
            Origin::Frame(handle.clone()),
            json!({"type": "forward", "payload": {"innerWindowId": "w1", "n": n}}),
            forward,
        );
        replies.push(relay_reply);
        replies.push(forward_reply);
    }
    for reply in replies {
        assert_eq!(reply.await.unwrap(), Reply::Done);
    }

    let expected: Vec<u64> = (0..200).collect();
    assert_eq!(sequence_numbers(&frame.scripts()), expected);
    assert_eq!(sequence_numbers(&h.background.scripts()), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatcher_answers_get_models_alongside_relays() {
    let h = harness().await;
    let dispatcher = OrderedDispatcher::new(h.router.clone());

    let (models, models_reply) = ReplyChannel::new();
    dispatcher.submit(
        Origin::Background,
        json!({"type": "getModels", "payload": {"sourceLanguage": "en", "targetLanguage": "fr"}}),
        models,
    );
    let (relay, relay_reply) = ReplyChannel::new();
    dispatcher.submit(
        Origin::Background,
        json!({"type": "background", "payload": {"innerWindowId": "ghost"}}),
        relay,
    );

    assert!(matches!(models_reply.await.unwrap(), Reply::Models(_)));
    assert_eq!(
        relay_reply.await.unwrap(),
        Reply::Error {
            error: UNAVAILABLE_MESSAGE.to_string()
        }
    );
}
