//! Camera and viewer socket tests against a served router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use courtline_api::{create_router, ApiConfig, AppState};
use courtline_models::{BallPosition, StreamKey};
use courtline_queue::{MemoryQueue, OverflowPolicy};
use courtline_worker::{
    BallDetector, BounceClassifier, CameraStatus, DecodedFrame, Detection, InMemoryCatalog,
    Pipeline, PipelineResult, WorkerConfig,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct FixedBall;

#[async_trait]
impl BallDetector for FixedBall {
    async fn detect(&self, _frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        Ok(vec![Detection {
            label: "ball".to_string(),
            confidence: 0.8,
            center: BallPosition::new(12.0, 34.0),
        }])
    }
}

#[async_trait]
impl BounceClassifier for FixedBall {
    async fn bounce_probability(&self, _window: &[[f32; 2]]) -> PipelineResult<f32> {
        Ok(0.0)
    }
}

struct Server {
    addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    catalog: Arc<InMemoryCatalog>,
}

async fn serve() -> Server {
    let catalog = Arc::new(InMemoryCatalog::new().with_camera("court-1", "1"));
    let pipeline = Arc::new(Pipeline::new(
        WorkerConfig::default(),
        Arc::new(MemoryQueue::new(16, OverflowPolicy::DropOldest)),
        catalog.clone(),
        Arc::new(FixedBall),
        Arc::new(FixedBall),
    ));
    pipeline.start().await;

    let state = AppState::new(ApiConfig::default(), Arc::clone(&pipeline));
    let app = create_router(state, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        addr,
        pipeline,
        catalog,
    }
}

/// Connect and consume the greeting.
async fn connect(addr: SocketAddr, endpoint: &str) -> Client {
    let (mut ws, _) = connect_async(format!("ws://{}/ws/{}", addr, endpoint))
        .await
        .unwrap();
    assert_eq!(recv(&mut ws).await["type"], "server_ack");
    ws
}

async fn send(ws: &mut Client, msg: Value) {
    ws.send(Message::Text(msg.to_string())).await.unwrap();
}

/// Next text message, ignoring pings.
async fn recv(ws: &mut Client) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await.expect("socket closed").unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    })
    .await
    .expect("no message received")
}

/// Next message of type `kind`, skipping live previews and the like.
async fn recv_kind(ws: &mut Client, kind: &str) -> Value {
    loop {
        let msg = recv(ws).await;
        if msg["type"] == kind {
            return msg;
        }
    }
}

fn jpeg_b64() -> String {
    let pixels = vec![120u8; 8 * 8 * 3];
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 75)
        .encode(&pixels, 8, 8, ColorType::Rgb8)
        .unwrap();
    STANDARD.encode(out)
}

#[tokio::test]
async fn test_camera_registration_and_disconnect() {
    let server = serve().await;
    let key = StreamKey::new("court-1", "1");
    let mut cam = connect(server.addr, "camera").await;

    // Unknown cameras get no reply at all, so the next message is the ack
    // for the known one.
    send(
        &mut cam,
        json!({"type": "register_stream", "court_id": "court-9", "cam_id": "1"}),
    )
    .await;
    send(
        &mut cam,
        json!({"type": "register_stream", "court_id": "court-1", "cam_id": 1, "fps": 25}),
    )
    .await;
    assert_eq!(
        recv(&mut cam).await,
        json!({"type": "registered", "ok": true, "court_id": "court-1", "cam_id": "1"})
    );

    let slot = server.pipeline.registry().get(&key).await.unwrap();
    assert_eq!(slot.fps(), 25);
    assert_eq!(server.catalog.status(&key).await, Some(CameraStatus::Online));
    assert!(server
        .pipeline
        .registry()
        .get(&StreamKey::new("court-9", "1"))
        .await
        .is_none());

    cam.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.pipeline.registry().get(&key).await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream still registered after disconnect");
    assert_eq!(server.catalog.status(&key).await, Some(CameraStatus::Offline));
}

#[tokio::test]
async fn test_frame_for_unregistered_stream_is_rejected() {
    let server = serve().await;
    let mut cam = connect(server.addr, "camera").await;

    send(
        &mut cam,
        json!({"type": "frame", "court_id": "court-1", "cam_id": "1", "jpg_b64": jpeg_b64()}),
    )
    .await;
    let reply = recv(&mut cam).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["msg"], "Unknown stream: court-1/1");
}

#[tokio::test]
async fn test_set_polygons_requires_stream() {
    let server = serve().await;
    let mut viewer = connect(server.addr, "viewer").await;
    let polygons = json!({
        "type": "set_polygons",
        "court_id": "court-1",
        "cam_id": "1",
        "left": [[0, 0], [100, 0], [100, 100], [0, 100]],
        "right": null
    });

    send(&mut viewer, polygons.clone()).await;
    assert_eq!(
        recv(&mut viewer).await,
        json!({"type": "error", "msg": "Stream not found"})
    );

    server
        .pipeline
        .register_stream(StreamKey::new("court-1", "1"), 30)
        .await
        .unwrap();
    send(&mut viewer, polygons).await;
    assert_eq!(
        recv(&mut viewer).await,
        json!({"type": "polygons_ok", "ok": true})
    );
}

#[tokio::test]
async fn test_replay_errors() {
    let server = serve().await;
    let mut viewer = connect(server.addr, "viewer").await;

    send(
        &mut viewer,
        json!({"type": "request_replay", "court_id": "court-1", "cam_id": "1", "duration": 2.0}),
    )
    .await;
    assert_eq!(
        recv(&mut viewer).await,
        json!({"type": "error", "msg": "Stream not found"})
    );

    server
        .pipeline
        .register_stream(StreamKey::new("court-1", "1"), 30)
        .await
        .unwrap();

    send(
        &mut viewer,
        json!({"type": "request_replay", "court_id": "court-1", "cam_id": "1", "duration": 2.0}),
    )
    .await;
    assert_eq!(
        recv(&mut viewer).await,
        json!({"type": "error", "msg": "No frames available"})
    );

    send(
        &mut viewer,
        json!({"type": "request_replay", "court_id": "court-1", "cam_id": "1", "duration": 60}),
    )
    .await;
    let reply = recv(&mut viewer).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["msg"].as_str().unwrap().contains("exceeds maximum"));
}

#[tokio::test]
async fn test_viewer_receives_decision_and_replay() {
    let server = serve().await;
    let mut cam = connect(server.addr, "camera").await;
    let mut viewer = connect(server.addr, "viewer").await;

    send(
        &mut cam,
        json!({"type": "register_stream", "court_id": "court-1", "cam_id": "1"}),
    )
    .await;
    assert_eq!(recv(&mut cam).await["type"], "registered");

    // The status reply proves the join was handled before any frame.
    send(&mut viewer, json!({"type": "join_camera_feed", "cam_id": 1})).await;
    send(&mut viewer, json!({"type": "get_status"})).await;
    let status = recv(&mut viewer).await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["active_streams"], 1);

    let frame = jpeg_b64();
    send(
        &mut cam,
        json!({"type": "frame", "court_id": "court-1", "cam_id": "1", "jpg_b64": frame}),
    )
    .await;

    let preview = recv(&mut viewer).await;
    assert_eq!(preview, json!({"type": "live_frame", "cam_id": "1", "frame": frame}));

    let decision = recv_kind(&mut viewer, "decision").await;
    assert_eq!(decision["court_id"], "court-1");
    assert_eq!(decision["cam_id"], "1");
    assert_eq!(decision["ball_xy"], json!([12.0, 34.0]));
    assert_eq!(decision["verdict"], "UNKNOWN");

    send(
        &mut viewer,
        json!({"type": "request_replay", "court_id": "court-1", "cam_id": "1", "duration": 1.0}),
    )
    .await;
    let clip = recv_kind(&mut viewer, "replay_clip").await;
    assert_eq!(clip["fps"], 30);
    assert_eq!(clip["duration"], 1.0);
    assert_eq!(clip["frames"], json!([frame]));

    server.pipeline.shutdown().await;
}
