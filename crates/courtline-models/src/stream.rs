//! Stream identity.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifies exactly one live camera feed: a camera on a court.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// Court the camera belongs to
    pub court_id: String,
    /// Camera identifier, unique within its court
    #[serde(deserialize_with = "deserialize_id")]
    pub cam_id: String,
}

impl StreamKey {
    /// Create a new stream key.
    pub fn new(court_id: impl Into<String>, cam_id: impl Into<String>) -> Self {
        Self {
            court_id: court_id.into(),
            cam_id: cam_id.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.court_id, self.cam_id)
    }
}

/// Deserialize an identifier that camera firmware may send either as a
/// JSON string or as a bare number (`"cam_id": 2`).
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cam_id_is_normalized() {
        let key: StreamKey = serde_json::from_str(r#"{"court_id":"c1","cam_id":2}"#).unwrap();
        assert_eq!(key, StreamKey::new("c1", "2"));
    }

    #[test]
    fn test_display() {
        assert_eq!(StreamKey::new("court-a", "3").to_string(), "court-a/3");
    }
}
