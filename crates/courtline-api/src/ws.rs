//! WebSocket handlers for camera and viewer clients.
//!
//! Each socket is split: a spawned send task drains a bounded outbox while
//! the handler reads client messages. Camera sockets register streams and
//! push frames; their streams are unregistered when the socket goes away.
//! Viewer sockets join camera rooms, request replays and configure zones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use courtline_models::{
    CameraRequest, ServerMessage, SetPolygonsRequest, StreamKey, ViewerRequest,
};
use courtline_worker::{PipelineError, RoomMessage, StreamHandle};

use crate::metrics;
use crate::state::AppState;

/// Outgoing messages buffered per socket before senders wait.
const WS_SEND_BUFFER_SIZE: usize = 32;

/// Ping interval for idle sockets.
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const CAMERA: &str = "camera";
const VIEWER: &str = "viewer";

static ACTIVE_CAMERA_CONNECTIONS: AtomicI64 = AtomicI64::new(0);
static ACTIVE_VIEWER_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

fn active_connections(endpoint: &'static str) -> &'static AtomicI64 {
    if endpoint == CAMERA {
        &ACTIVE_CAMERA_CONNECTIONS
    } else {
        &ACTIVE_VIEWER_CONNECTIONS
    }
}

/// Sending half of a socket.
#[derive(Clone)]
struct Outbox {
    tx: mpsc::Sender<Message>,
    endpoint: &'static str,
}

impl Outbox {
    /// Queue a message for the client. Returns false once the client is gone.
    async fn send(&self, msg: &ServerMessage) -> bool {
        let json = match serde_json::to_string(msg) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize {} message: {}", msg.kind(), e);
                return true;
            }
        };
        metrics::record_ws_message_sent(self.endpoint, msg.kind());

        // Use try_send for non-blocking, fall back to blocking send
        match self.tx.try_send(Message::Text(json)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                debug!("WebSocket send buffer full, applying backpressure");
                self.tx.send(message).await.is_ok()
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    async fn ping(&self) -> bool {
        self.tx.send(Message::Ping(Vec::new())).await.is_ok()
    }
}

/// Split the socket and spawn the task that writes the outbox to it.
fn split_socket(
    socket: WebSocket,
    endpoint: &'static str,
) -> (Outbox, SplitStream<WebSocket>, JoinHandle<()>) {
    let (mut ws_sender, receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    (Outbox { tx, endpoint }, receiver, send_task)
}

/// What the read loop should do after one client frame.
enum Incoming {
    Text(String),
    Skip,
    Closed,
}

fn classify(msg: Option<Result<Message, axum::Error>>, outbox: &Outbox) -> Incoming {
    match msg {
        Some(Ok(Message::Text(text))) => {
            metrics::record_ws_message_received(outbox.endpoint);
            Incoming::Text(text)
        }
        Some(Ok(Message::Close(_))) | None => Incoming::Closed,
        Some(Ok(_)) => Incoming::Skip,
        Some(Err(e)) => {
            debug!(endpoint = outbox.endpoint, "WebSocket receive error: {}", e);
            Incoming::Closed
        }
    }
}

fn connection_opened(endpoint: &'static str) {
    let count = active_connections(endpoint).fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(endpoint, count);
    metrics::record_ws_connection(endpoint);
}

fn connection_closed(endpoint: &'static str) {
    let count = active_connections(endpoint).fetch_sub(1, Ordering::SeqCst) - 1;
    metrics::set_ws_active_connections(endpoint, count);
}

fn heartbeat() -> tokio::time::Interval {
    interval_at(Instant::now() + WS_HEARTBEAT_INTERVAL, WS_HEARTBEAT_INTERVAL)
}

async fn reply_invalid(outbox: &Outbox, err: serde_json::Error) {
    outbox
        .send(&ServerMessage::error(format!("Invalid message: {}", err)))
        .await;
}

// ============================================================================
// Camera socket
// ============================================================================

/// Camera ingestion endpoint.
pub async fn ws_camera(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    connection_opened(CAMERA);

    ws.on_upgrade(|socket| async move {
        handle_camera_socket(socket, state).await;
        connection_closed(CAMERA);
    })
}

async fn handle_camera_socket(socket: WebSocket, state: AppState) {
    let (outbox, mut receiver, send_task) = split_socket(socket, CAMERA);
    outbox.send(&ServerMessage::ack("camera connected")).await;

    // Streams registered over this socket
    let mut streams: HashMap<StreamKey, StreamHandle> = HashMap::new();
    let mut heartbeat = heartbeat();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !outbox.ping().await {
                    break;
                }
            }
            msg = receiver.next() => match classify(msg, &outbox) {
                Incoming::Text(text) => {
                    handle_camera_message(&state, &outbox, &mut streams, &text).await;
                }
                Incoming::Skip => {}
                Incoming::Closed => break,
            },
        }
    }

    for (key, handle) in streams {
        if state.pipeline.release_stream(&handle).await {
            info!(stream = %key, "Camera disconnected, stream unregistered");
        } else {
            debug!(stream = %key, "Camera disconnected, stream already replaced or removed");
        }
    }

    drop(outbox);
    let _ = send_task.await;
}

async fn handle_camera_message(
    state: &AppState,
    outbox: &Outbox,
    streams: &mut HashMap<StreamKey, StreamHandle>,
    text: &str,
) {
    let request: CameraRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => return reply_invalid(outbox, e).await,
    };

    match request {
        CameraRequest::RegisterStream {
            court_id,
            cam_id,
            fps,
        } => {
            let key = StreamKey::new(court_id, cam_id);
            match state.pipeline.register_stream(key.clone(), fps).await {
                Ok(handle) => {
                    streams.insert(key.clone(), handle);
                    outbox.send(&ServerMessage::registered(&key)).await;
                }
                // Unknown cameras get no ack; the registry logs the rejection.
                Err(PipelineError::UnknownStream(_)) => {}
                Err(e) => {
                    warn!(stream = %key, "Registration failed: {}", e);
                    outbox.send(&ServerMessage::error(e.to_string())).await;
                }
            }
        }

        CameraRequest::Frame {
            court_id,
            cam_id,
            jpg_b64,
        } => {
            let key = StreamKey::new(court_id, cam_id);
            if let Err(e) = state.pipeline.ingest_frame(&key, &jpg_b64).await {
                debug!(stream = %key, "Frame rejected: {}", e);
                outbox.send(&ServerMessage::error(e.to_string())).await;
            }
        }

        CameraRequest::SetPolygons(request) => handle_set_polygons(state, outbox, request).await,
    }
}

// ============================================================================
// Viewer socket
// ============================================================================

/// Viewer endpoint: live previews, decisions, replays and zone setup.
pub async fn ws_viewer(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    connection_opened(VIEWER);

    ws.on_upgrade(|socket| async move {
        handle_viewer_socket(socket, state).await;
        connection_closed(VIEWER);
    })
}

async fn handle_viewer_socket(socket: WebSocket, state: AppState) {
    let (outbox, mut receiver, send_task) = split_socket(socket, VIEWER);
    outbox.send(&ServerMessage::ack("viewer connected")).await;

    // One forwarder per joined room, keyed by camera id
    let mut rooms: HashMap<String, JoinHandle<()>> = HashMap::new();
    let mut heartbeat = heartbeat();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !outbox.ping().await {
                    break;
                }
            }
            msg = receiver.next() => match classify(msg, &outbox) {
                Incoming::Text(text) => {
                    handle_viewer_message(&state, &outbox, &mut rooms, &text).await;
                }
                Incoming::Skip => {}
                Incoming::Closed => break,
            },
        }
    }

    for (_, forwarder) in rooms {
        forwarder.abort();
    }
    drop(outbox);
    let _ = send_task.await;
}

async fn handle_viewer_message(
    state: &AppState,
    outbox: &Outbox,
    rooms: &mut HashMap<String, JoinHandle<()>>,
    text: &str,
) {
    let request: ViewerRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => return reply_invalid(outbox, e).await,
    };

    match request {
        ViewerRequest::JoinCameraFeed { cam_id } => {
            if rooms.get(&cam_id).is_some_and(|f| !f.is_finished()) {
                return;
            }
            let rx = state.pipeline.subscribe(&cam_id).await;
            debug!(cam_id = %cam_id, "Viewer joined camera room");
            let forwarder = spawn_room_forwarder(cam_id.clone(), rx, outbox.clone());
            rooms.insert(cam_id, forwarder);
        }

        ViewerRequest::RequestReplay {
            court_id,
            cam_id,
            duration,
        } => {
            let key = StreamKey::new(court_id, cam_id);
            let reply = replay_message(state, &key, duration).await;
            outbox.send(&reply).await;
        }

        ViewerRequest::SetPolygons(request) => handle_set_polygons(state, outbox, request).await,

        ViewerRequest::GetStatus => {
            let status = state.pipeline.status().await;
            outbox.send(&ServerMessage::Status(status)).await;
        }
    }
}

/// Relay one camera room to a viewer until the viewer leaves or the room closes.
fn spawn_room_forwarder(
    cam_id: String,
    mut rx: broadcast::Receiver<RoomMessage>,
    outbox: Outbox,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !outbox.send(&msg).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(cam_id = %cam_id, skipped, "Viewer lagging, skipped room messages");
                    metrics::record_ws_lagged(skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Check a requested replay length against the configured maximum.
pub fn validate_replay_duration(duration: f64, max_seconds: f64) -> Result<(), String> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(format!("Replay duration must be positive, got {}", duration));
    }
    if duration > max_seconds {
        return Err(format!(
            "Replay duration {} exceeds maximum of {} seconds",
            duration, max_seconds
        ));
    }
    Ok(())
}

async fn replay_message(state: &AppState, key: &StreamKey, duration: f64) -> ServerMessage {
    if let Err(msg) = validate_replay_duration(duration, state.config.replay_max_seconds) {
        return ServerMessage::error(msg);
    }

    match state.pipeline.replay(key, duration).await {
        Ok(clip) => {
            debug!(stream = %key, frames = clip.frames.len(), "Serving replay");
            ServerMessage::ReplayClip {
                court_id: clip.key.court_id,
                cam_id: clip.key.cam_id,
                fps: clip.fps,
                frames: clip
                    .frames
                    .iter()
                    .map(|frame| STANDARD.encode(frame.jpeg()))
                    .collect(),
                duration,
            }
        }
        Err(e) => ServerMessage::error(e.to_string()),
    }
}

async fn handle_set_polygons(state: &AppState, outbox: &Outbox, request: SetPolygonsRequest) {
    let key = request.stream_key();
    let reply = match state.pipeline.set_zones(&key, request.into_zones()).await {
        Ok(()) => ServerMessage::polygons_ok(),
        Err(e) => ServerMessage::error(e.to_string()),
    };
    outbox.send(&reply).await;
}
