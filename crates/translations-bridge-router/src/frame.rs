//! Frame registry
//!
//! Maps the caller-generated frame identifiers to the content frames that
//! sent them. The registry only holds weak references: a frame the host has
//! dropped simply stops resolving.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use translations_bridge_core::FrameId;

use crate::context::{ContentFrame, FrameHandle};

struct FrameEntry {
    frame: Weak<dyn ContentFrame>,
    /// Serializes relays to this frame in submission order
    order: Arc<Mutex<()>>,
}

/// A resolved frame together with its relay ordering lock
pub(crate) struct LiveFrame {
    pub frame: FrameHandle,
    pub order: Arc<Mutex<()>>,
}

/// Process-wide map from frame identifier to content frame
#[derive(Default)]
pub struct FrameRegistry {
    frames: RwLock<HashMap<FrameId, FrameEntry>>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id`, replacing any previous registration
    ///
    /// An absent handle is ignored.
    pub async fn register(&self, handle: Option<&FrameHandle>, id: impl Into<FrameId>) {
        let Some(handle) = handle else {
            return;
        };
        let id = id.into();
        let frame = Arc::downgrade(handle);

        let mut frames = self.frames.write().await;
        match frames.get_mut(&id) {
            // Relays already waiting on the order lock stay ahead of new ones
            Some(entry) => {
                if !Weak::ptr_eq(&entry.frame, &frame) {
                    debug!(frame = %id, "Replaced frame registration");
                    entry.frame = frame;
                }
            }
            None => {
                frames.insert(
                    id,
                    FrameEntry {
                        frame,
                        order: Arc::new(Mutex::new(())),
                    },
                );
            }
        }
    }

    /// Remove the registration for `id`, returning whether one existed
    pub async fn unregister(&self, id: &FrameId) -> bool {
        self.frames.write().await.remove(id).is_some()
    }

    /// Live frame registered under `id`
    pub async fn lookup(&self, id: &FrameId) -> Option<FrameHandle> {
        self.resolve(id).await.map(|live| live.frame)
    }

    /// Number of registrations whose frame is still alive
    pub async fn len(&self) -> usize {
        self.frames
            .read()
            .await
            .values()
            .filter(|entry| entry.frame.strong_count() > 0)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub(crate) async fn resolve(&self, id: &FrameId) -> Option<LiveFrame> {
        {
            let frames = self.frames.read().await;
            let entry = frames.get(id)?;
            if let Some(frame) = entry.frame.upgrade() {
                return Some(LiveFrame {
                    frame,
                    order: entry.order.clone(),
                });
            }
        }

        let mut frames = self.frames.write().await;
        if frames.get(id).is_some_and(|entry| entry.frame.strong_count() == 0) {
            frames.remove(id);
            debug!(frame = %id, "Pruned registration of a dropped frame");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NullFrame;

    #[async_trait]
    impl ContentFrame for NullFrame {
        async fn evaluate(&self, _script: &str) -> Result<Value, ScriptError> {
            Ok(Value::Null)
        }
    }

    fn frame() -> FrameHandle {
        Arc::new(NullFrame)
    }

    #[tokio::test]
    async fn test_register_lookup_unregister() {
        let registry = FrameRegistry::new();
        let handle = frame();
        let id = FrameId::from("window-1");

        registry.register(Some(&handle), id.clone()).await;
        let found = registry.lookup(&id).await.unwrap();
        assert!(Arc::ptr_eq(&found, &handle));

        assert!(registry.unregister(&id).await);
        assert!(registry.lookup(&id).await.is_none());
        assert!(!registry.unregister(&id).await);
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let registry = FrameRegistry::new();
        assert!(registry.lookup(&FrameId::from("ghost")).await.is_none());
    }

    #[tokio::test]
    async fn test_absent_handle_is_ignored() {
        let registry = FrameRegistry::new();
        registry.register(None, "window-1").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = FrameRegistry::new();
        let first = frame();
        let second = frame();

        registry.register(Some(&first), "window-1").await;
        registry.register(Some(&second), "window-1").await;

        let found = registry.lookup(&FrameId::from("window-1")).await.unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_reregistration_keeps_relay_order_lock() {
        let registry = FrameRegistry::new();
        let first = frame();
        let second = frame();
        let id = FrameId::from("window-1");

        registry.register(Some(&first), id.clone()).await;
        let before = registry.resolve(&id).await.unwrap().order;

        registry.register(Some(&first), id.clone()).await;
        assert!(Arc::ptr_eq(&before, &registry.resolve(&id).await.unwrap().order));

        registry.register(Some(&second), id.clone()).await;
        let after = registry.resolve(&id).await.unwrap();
        assert!(Arc::ptr_eq(&after.frame, &second));
        assert!(Arc::ptr_eq(&before, &after.order));
    }

    #[tokio::test]
    async fn test_dropped_frame_is_not_found() {
        let registry = FrameRegistry::new();
        let handle = frame();
        registry.register(Some(&handle), "window-1").await;
        drop(handle);

        assert_eq!(registry.len().await, 0);
        assert!(registry.lookup(&FrameId::from("window-1")).await.is_none());
        assert!(!registry.unregister(&FrameId::from("window-1")).await);
    }
}
