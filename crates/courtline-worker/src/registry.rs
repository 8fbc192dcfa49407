//! Stream registry.
//!
//! Single source of truth for which streams are live. Each registered
//! stream owns a [`StreamSlot`] with its mutable [`StreamState`] behind a
//! mutex. Re-registration replaces the slot; unregistration removes it and
//! marks it retired so workers holding the old handle discard their results.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use courtline_models::{CourtZones, StreamKey, Verdict};

use crate::bounce::BounceTracker;
use crate::catalog::{CameraCatalog, CameraStatus};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::DecodedFrame;
use crate::logging::StreamLogger;
use crate::metrics;
use crate::replay::ReplayBuffer;

/// Per-stream sizing shared by every registration.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub bounce_window: usize,
    pub bounce_threshold: f32,
    pub replay_capacity: usize,
}

/// Mutable state of one live stream.
#[derive(Debug)]
pub struct StreamState {
    pub bounce: BounceTracker,
    pub zones: CourtZones,
    pub replay: ReplayBuffer<DecodedFrame>,
    retired: bool,
}

impl StreamState {
    fn new(settings: &StreamSettings) -> Self {
        Self {
            bounce: BounceTracker::new(settings.bounce_window, settings.bounce_threshold),
            zones: CourtZones::default(),
            replay: ReplayBuffer::new(settings.replay_capacity),
            retired: false,
        }
    }

    /// True once the stream was unregistered or registered again.
    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

/// One registration of a stream.
#[derive(Debug)]
pub struct StreamSlot {
    key: StreamKey,
    fps: u32,
    registered_at: DateTime<Utc>,
    logger: StreamLogger,
    state: Mutex<StreamState>,
}

impl StreamSlot {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn logger(&self) -> &StreamLogger {
        &self.logger
    }

    pub async fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().await
    }

    /// Whether a job enqueued at `enqueued_at` predates this registration.
    pub fn is_stale(&self, enqueued_at: DateTime<Utc>) -> bool {
        enqueued_at.timestamp_micros() < self.registered_at.timestamp_micros()
    }
}

pub type StreamHandle = Arc<StreamSlot>;

/// Replay frames with the stream's frame rate.
#[derive(Debug, Clone)]
pub struct ReplayClip {
    pub key: StreamKey,
    pub fps: u32,
    pub frames: Vec<DecodedFrame>,
}

/// Snapshot of one live stream, for admin listings.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub key: StreamKey,
    pub fps: u32,
    pub registered_at: DateTime<Utc>,
    pub positions: usize,
    pub verdict: Verdict,
    pub replay_frames: usize,
    pub zones_configured: bool,
}

pub struct StreamRegistry {
    streams: RwLock<HashMap<StreamKey, StreamHandle>>,
    catalog: Arc<dyn CameraCatalog>,
    settings: StreamSettings,
}

impl StreamRegistry {
    pub fn new(catalog: Arc<dyn CameraCatalog>, settings: StreamSettings) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CameraCatalog> {
        &self.catalog
    }

    /// Create fresh state for `key`, replacing any previous registration.
    ///
    /// Fails with `UnknownStream` when the catalog does not list the camera.
    pub async fn register(&self, key: StreamKey, fps: u32) -> PipelineResult<StreamHandle> {
        let logger = StreamLogger::new(&key);
        if !self.catalog.contains(&key).await {
            logger.log_rejected("camera not in catalog");
            return Err(PipelineError::UnknownStream(key));
        }

        let fps = if fps == 0 {
            logger.log_warning("fps 0 requested, using 1");
            1
        } else {
            fps
        };

        let slot = Arc::new(StreamSlot {
            key: key.clone(),
            fps,
            registered_at: Utc::now(),
            logger: logger.clone(),
            state: Mutex::new(StreamState::new(&self.settings)),
        });

        let previous = {
            let mut streams = self.streams.write().await;
            let previous = streams.insert(key.clone(), Arc::clone(&slot));
            metrics::set_active_streams(streams.len());
            previous
        };
        if let Some(previous) = previous {
            previous.lock().await.retired = true;
            debug!(stream = %key, "Replaced existing registration");
        }

        if let Err(e) = self.catalog.set_status(&key, CameraStatus::Online).await {
            logger.log_warning(&format!("failed to mark camera online: {}", e));
        }
        logger.log_registered(fps);
        Ok(slot)
    }

    pub async fn get(&self, key: &StreamKey) -> Option<StreamHandle> {
        self.streams.read().await.get(key).cloned()
    }

    /// Remove `key`. Jobs still in flight for it are discarded by workers.
    pub async fn unregister(&self, key: &StreamKey) -> PipelineResult<()> {
        let removed = {
            let mut streams = self.streams.write().await;
            let removed = streams.remove(key);
            metrics::set_active_streams(streams.len());
            removed
        };
        let Some(slot) = removed else {
            return Err(PipelineError::NotFound(key.clone()));
        };

        self.retire(&slot).await;
        Ok(())
    }

    /// Unregister `handle` only if it is still the current registration of
    /// its stream. Returns false when it was already replaced or removed.
    pub async fn release(&self, handle: &StreamHandle) -> bool {
        let released = {
            let mut streams = self.streams.write().await;
            let current = streams
                .get(handle.key())
                .is_some_and(|slot| Arc::ptr_eq(slot, handle));
            if current {
                streams.remove(handle.key());
                metrics::set_active_streams(streams.len());
            }
            current
        };

        if released {
            self.retire(handle).await;
        }
        released
    }

    async fn retire(&self, slot: &StreamSlot) {
        slot.lock().await.retired = true;
        if let Err(e) = self.catalog.set_status(slot.key(), CameraStatus::Offline).await {
            warn!(stream = %slot.key(), "Failed to mark camera offline: {}", e);
        }
        slot.logger().log_unregistered();
    }

    pub async fn set_zones(&self, key: &StreamKey, zones: CourtZones) -> PipelineResult<()> {
        let slot = self
            .get(key)
            .await
            .ok_or_else(|| PipelineError::NotFound(key.clone()))?;
        slot.lock().await.zones = zones;
        debug!(stream = %key, "Zones updated");
        Ok(())
    }

    /// The last `duration_secs` of buffered frames.
    pub async fn replay(&self, key: &StreamKey, duration_secs: f64) -> PipelineResult<ReplayClip> {
        let slot = self
            .get(key)
            .await
            .ok_or_else(|| PipelineError::NotFound(key.clone()))?;

        let frames = slot
            .lock()
            .await
            .replay
            .extract_tail(duration_secs, slot.fps())
            .ok_or_else(|| PipelineError::NoFramesAvailable(key.clone()))?;

        Ok(ReplayClip {
            key: key.clone(),
            fps: slot.fps(),
            frames,
        })
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }

    /// Snapshot of every live stream, sorted by key.
    pub async fn list(&self) -> Vec<StreamInfo> {
        let slots: Vec<StreamHandle> = self.streams.read().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.lock().await;
            infos.push(StreamInfo {
                key: slot.key().clone(),
                fps: slot.fps(),
                registered_at: slot.registered_at(),
                positions: state.bounce.history_len(),
                verdict: state.bounce.verdict(),
                replay_frames: state.replay.len(),
                zones_configured: state.zones.is_configured(),
            });
        }
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    fn settings() -> StreamSettings {
        StreamSettings {
            bounce_window: 4,
            bounce_threshold: 0.5,
            replay_capacity: 10,
        }
    }

    fn registry() -> (Arc<InMemoryCatalog>, StreamRegistry) {
        let catalog = Arc::new(InMemoryCatalog::new().with_camera("c1", "1"));
        let registry = StreamRegistry::new(catalog.clone(), settings());
        (catalog, registry)
    }

    #[tokio::test]
    async fn test_register_requires_catalog_entry() {
        let (_, registry) = registry();
        let err = registry
            .register(StreamKey::new("c1", "9"), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStream(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_marks_online_and_unregister_offline() {
        let (catalog, registry) = registry();
        let key = StreamKey::new("c1", "1");

        registry.register(key.clone(), 30).await.unwrap();
        assert_eq!(catalog.status(&key).await, Some(CameraStatus::Online));

        registry.unregister(&key).await.unwrap();
        assert_eq!(catalog.status(&key).await, Some(CameraStatus::Offline));
        assert!(registry.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_twice_is_not_found() {
        let (_, registry) = registry();
        let key = StreamKey::new("c1", "1");
        registry.register(key.clone(), 30).await.unwrap();
        registry.unregister(&key).await.unwrap();

        let err = registry.unregister(&key).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reregister_retires_old_slot() {
        let (_, registry) = registry();
        let key = StreamKey::new("c1", "1");

        let first = registry.register(key.clone(), 30).await.unwrap();
        {
            let mut state = first.lock().await;
            let zones = state.zones.clone();
            state
                .bounce
                .record(Some(courtline_models::BallPosition::new(1.0, 1.0)), None, &zones);
        }

        let second = registry.register(key.clone(), 15).await.unwrap();
        assert!(first.lock().await.is_retired());
        assert!(!second.lock().await.is_retired());
        assert_eq!(second.lock().await.bounce.history_len(), 0);
        assert_eq!(registry.get(&key).await.unwrap().fps(), 15);
    }

    #[tokio::test]
    async fn test_release_ignores_replaced_registration() {
        let (catalog, registry) = registry();
        let key = StreamKey::new("c1", "1");

        let first = registry.register(key.clone(), 30).await.unwrap();
        let second = registry.register(key.clone(), 30).await.unwrap();

        assert!(!registry.release(&first).await);
        assert!(Arc::ptr_eq(&registry.get(&key).await.unwrap(), &second));
        assert_eq!(catalog.status(&key).await, Some(CameraStatus::Online));

        assert!(registry.release(&second).await);
        assert!(registry.get(&key).await.is_none());
        assert_eq!(catalog.status(&key).await, Some(CameraStatus::Offline));
    }

    #[tokio::test]
    async fn test_set_zones_on_missing_stream() {
        let (_, registry) = registry();
        let err = registry
            .set_zones(&StreamKey::new("c1", "1"), CourtZones::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Stream not found");
    }

    #[tokio::test]
    async fn test_replay_before_frames() {
        let (_, registry) = registry();
        let key = StreamKey::new("c1", "1");
        registry.register(key.clone(), 30).await.unwrap();

        let err = registry.replay(&key, 5.0).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesAvailable(_)));
    }

    #[tokio::test]
    async fn test_zero_fps_is_clamped() {
        let (_, registry) = registry();
        let slot = registry.register(StreamKey::new("c1", "1"), 0).await.unwrap();
        assert_eq!(slot.fps(), 1);
    }
}
