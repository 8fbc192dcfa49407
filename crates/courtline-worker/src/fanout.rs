//! Result fan-out.
//!
//! Viewers join rooms keyed by camera id. Each room is a broadcast channel
//! of shared [`ServerMessage`]s; slow viewers lag and lose messages rather
//! than holding up publishers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use courtline_models::{Decision, ServerMessage};

use crate::metrics;

pub type RoomMessage = Arc<ServerMessage>;

pub struct FanoutHub {
    rooms: RwLock<HashMap<String, broadcast::Sender<RoomMessage>>>,
    room_capacity: usize,
}

impl FanoutHub {
    pub fn new(room_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            room_capacity: room_capacity.max(1),
        }
    }

    /// Join the room of `cam_id`, creating it if needed.
    pub async fn subscribe(&self, cam_id: &str) -> broadcast::Receiver<RoomMessage> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(cam_id.to_string())
            .or_insert_with(|| broadcast::channel(self.room_capacity).0)
            .subscribe()
    }

    /// Deliver to everyone in the room. Returns the number of receivers.
    pub async fn publish(&self, cam_id: &str, message: ServerMessage) -> usize {
        let delivered = {
            let rooms = self.rooms.read().await;
            match rooms.get(cam_id) {
                Some(tx) => tx.send(Arc::new(message)).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(n) => n,
            None => {
                self.prune(cam_id).await;
                0
            }
        }
    }

    async fn prune(&self, cam_id: &str) {
        let mut rooms = self.rooms.write().await;
        if rooms
            .get(cam_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            rooms.remove(cam_id);
            debug!(cam_id, "Closed empty viewer room");
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// Forward decisions from workers to viewer rooms until every sender is
/// dropped.
pub fn spawn_decision_fanout(
    hub: Arc<FanoutHub>,
    mut decisions: mpsc::Receiver<Decision>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(decision) = decisions.recv().await {
            let cam_id = decision.stream.cam_id.clone();
            let verdict = decision.verdict;
            let viewers = hub.publish(&cam_id, ServerMessage::Decision(decision)).await;
            metrics::record_decision_published(verdict.as_str());
            debug!(cam_id = %cam_id, %verdict, viewers, "Published decision");
        }
        info!("Decision fan-out stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtline_models::{StreamKey, Verdict};

    #[tokio::test]
    async fn test_publish_reaches_room_only() {
        let hub = FanoutHub::new(8);
        let mut cam1 = hub.subscribe("1").await;
        let mut cam2 = hub.subscribe("2").await;

        assert_eq!(hub.publish("1", ServerMessage::error("x")).await, 1);
        assert_eq!(cam1.recv().await.unwrap().kind(), "error");
        assert!(cam2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_room() {
        let hub = FanoutHub::new(8);
        assert_eq!(hub.publish("nobody", ServerMessage::error("x")).await, 0);
    }

    #[tokio::test]
    async fn test_empty_room_is_pruned() {
        let hub = FanoutHub::new(8);
        drop(hub.subscribe("1").await);
        assert_eq!(hub.room_count().await, 1);

        assert_eq!(hub.publish("1", ServerMessage::error("x")).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_fanout_task_forwards_in_order() {
        let hub = Arc::new(FanoutHub::new(8));
        let mut viewer = hub.subscribe("3").await;
        let (tx, rx) = mpsc::channel(4);
        let task = spawn_decision_fanout(Arc::clone(&hub), rx);

        for verdict in [Verdict::Unknown, Verdict::Out, Verdict::In] {
            tx.send(Decision::new(StreamKey::new("c1", "3"), None, verdict))
                .await
                .unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let mut seen = Vec::new();
        while let Ok(msg) = viewer.try_recv() {
            if let ServerMessage::Decision(d) = msg.as_ref() {
                seen.push(d.verdict);
            }
        }
        assert_eq!(seen, vec![Verdict::Unknown, Verdict::Out, Verdict::In]);
    }
}
