//! WebSocket message types.
//!
//! Camera clients and viewer clients talk to the server over separate
//! sockets. Every message is a JSON object tagged by `type`.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::stream::deserialize_id;
use crate::{CourtZones, Decision, Polygon, StreamKey};

fn default_fps() -> u32 {
    30
}

fn default_replay_duration() -> f64 {
    5.0
}

/// Polygon field where `null`, a missing key or an empty list all mean "unset".
fn deserialize_optional_polygon<'de, D>(deserializer: D) -> Result<Option<Polygon>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<(f64, f64)>> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => Polygon::new(v).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Zone configuration for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPolygonsRequest {
    pub court_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub cam_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_polygon")]
    pub left: Option<Polygon>,
    #[serde(default, deserialize_with = "deserialize_optional_polygon")]
    pub right: Option<Polygon>,
}

impl SetPolygonsRequest {
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(&self.court_id, &self.cam_id)
    }

    pub fn into_zones(self) -> CourtZones {
        CourtZones::new(self.left, self.right)
    }
}

/// Messages sent by camera clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraRequest {
    /// Announce a feed; must precede any frame
    RegisterStream {
        court_id: String,
        #[serde(deserialize_with = "deserialize_id")]
        cam_id: String,
        #[serde(default = "default_fps")]
        fps: u32,
    },

    /// One JPEG frame, base64 encoded
    Frame {
        court_id: String,
        #[serde(deserialize_with = "deserialize_id")]
        cam_id: String,
        jpg_b64: String,
    },

    SetPolygons(SetPolygonsRequest),
}

/// Messages sent by viewer (web app) clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerRequest {
    /// Subscribe to decisions and live preview of one camera
    JoinCameraFeed {
        #[serde(deserialize_with = "deserialize_id")]
        cam_id: String,
    },

    /// Ask for the last `duration` seconds of frames
    RequestReplay {
        court_id: String,
        #[serde(deserialize_with = "deserialize_id")]
        cam_id: String,
        #[serde(default = "default_replay_duration")]
        duration: f64,
    },

    SetPolygons(SetPolygonsRequest),

    GetStatus,
}

/// Pipeline status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusReport {
    pub ok: bool,
    pub courts: usize,
    pub total_cameras: usize,
    pub active_streams: usize,
    pub queue_depth: usize,
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub frames_failed: u64,
}

/// Messages sent by the server to either kind of client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when a socket connects
    ServerAck { msg: String },

    /// Registration accepted
    Registered {
        ok: bool,
        court_id: String,
        cam_id: String,
    },

    PolygonsOk { ok: bool },

    Error { msg: String },

    /// Raw preview frame, forwarded before inference
    LiveFrame { cam_id: String, frame: String },

    /// Per-frame inference result
    Decision(Decision),

    /// Replay frames for the requester only
    ReplayClip {
        court_id: String,
        cam_id: String,
        fps: u32,
        frames: Vec<String>,
        duration: f64,
    },

    Status(StatusReport),
}

impl ServerMessage {
    pub fn ack(msg: impl Into<String>) -> Self {
        ServerMessage::ServerAck { msg: msg.into() }
    }

    pub fn registered(key: &StreamKey) -> Self {
        ServerMessage::Registered {
            ok: true,
            court_id: key.court_id.clone(),
            cam_id: key.cam_id.clone(),
        }
    }

    pub fn polygons_ok() -> Self {
        ServerMessage::PolygonsOk { ok: true }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        ServerMessage::Error { msg: msg.into() }
    }

    pub fn live_frame(cam_id: impl Into<String>, frame: impl Into<String>) -> Self {
        ServerMessage::LiveFrame {
            cam_id: cam_id.into(),
            frame: frame.into(),
        }
    }

    /// Tag used for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ServerAck { .. } => "server_ack",
            ServerMessage::Registered { .. } => "registered",
            ServerMessage::PolygonsOk { .. } => "polygons_ok",
            ServerMessage::Error { .. } => "error",
            ServerMessage::LiveFrame { .. } => "live_frame",
            ServerMessage::Decision(_) => "decision",
            ServerMessage::ReplayClip { .. } => "replay_clip",
            ServerMessage::Status(_) => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BallPosition, Verdict};

    #[test]
    fn test_register_stream_defaults() {
        let msg: CameraRequest =
            serde_json::from_str(r#"{"type":"register_stream","court_id":"c1","cam_id":1}"#)
                .unwrap();
        match msg {
            CameraRequest::RegisterStream { court_id, cam_id, fps } => {
                assert_eq!(court_id, "c1");
                assert_eq!(cam_id, "1");
                assert_eq!(fps, 30);
            }
            other => panic!("Expected RegisterStream, got {:?}", other),
        }
    }

    #[test]
    fn test_set_polygons_empty_list_is_unset() {
        let msg: ViewerRequest = serde_json::from_str(
            r#"{"type":"set_polygons","court_id":"c1","cam_id":"1",
                "left":[[0,0],[10,0],[10,10]],"right":[]}"#,
        )
        .unwrap();
        let ViewerRequest::SetPolygons(req) = msg else {
            panic!("Expected SetPolygons");
        };
        assert!(req.left.is_some());
        assert!(req.right.is_none());
    }

    #[test]
    fn test_set_polygons_rejects_two_point_polygon() {
        let result = serde_json::from_str::<ViewerRequest>(
            r#"{"type":"set_polygons","court_id":"c1","cam_id":"1","left":[[0,0],[1,1]]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_duration_default() {
        let msg: ViewerRequest =
            serde_json::from_str(r#"{"type":"request_replay","court_id":"c1","cam_id":"1"}"#)
                .unwrap();
        match msg {
            ViewerRequest::RequestReplay { duration, .. } => assert_eq!(duration, 5.0),
            other => panic!("Expected RequestReplay, got {:?}", other),
        }
    }

    #[test]
    fn test_decision_message_is_flat() {
        let msg = ServerMessage::Decision(Decision::new(
            StreamKey::new("c1", "1"),
            Some(BallPosition::new(3.0, 4.0)),
            Verdict::In,
        ));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "decision");
        assert_eq!(json["court_id"], "c1");
        assert_eq!(json["verdict"], "IN");
    }

    #[test]
    fn test_error_message() {
        let json = serde_json::to_string(&ServerMessage::error("Stream not found")).unwrap();
        assert_eq!(json, r#"{"type":"error","msg":"Stream not found"}"#);
    }
}
