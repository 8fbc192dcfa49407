//! Court/camera catalog.
//!
//! The catalog decides which cameras may register. The pipeline only needs
//! membership checks and online/offline status updates; persistence lives
//! behind the [`CameraCatalog`] trait.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use courtline_models::stream::deserialize_id;
use courtline_models::StreamKey;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Online,
    Offline,
}

/// Catalog size, for status reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub courts: usize,
    pub cameras: usize,
}

#[async_trait]
pub trait CameraCatalog: Send + Sync {
    async fn contains(&self, key: &StreamKey) -> bool;

    async fn set_status(&self, key: &StreamKey, status: CameraStatus) -> PipelineResult<()>;

    async fn summary(&self) -> CatalogSummary;
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    courts: BTreeMap<String, CourtEntry>,
}

#[derive(Deserialize)]
struct CourtEntry {
    #[serde(default)]
    cameras: Vec<CameraId>,
}

#[derive(Deserialize)]
struct CameraId(#[serde(deserialize_with = "deserialize_id")] String);

/// Catalog held in memory, optionally loaded from a JSON file:
///
/// ```json
/// {"courts": {"court-1": {"cameras": ["1", "2"]}}}
/// ```
pub struct InMemoryCatalog {
    courts: RwLock<HashMap<String, HashMap<String, CameraStatus>>>,
    /// Admit and enroll cameras that are not listed
    permissive: bool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            courts: RwLock::new(HashMap::new()),
            permissive: false,
        }
    }

    /// Catalog that accepts every camera, enrolling it on first contact.
    /// Meant for local development without a catalog file.
    pub fn permissive() -> Self {
        Self {
            courts: RwLock::new(HashMap::new()),
            permissive: true,
        }
    }

    pub fn with_camera(mut self, court_id: impl Into<String>, cam_id: impl Into<String>) -> Self {
        self.courts
            .get_mut()
            .entry(court_id.into())
            .or_default()
            .insert(cam_id.into(), CameraStatus::Offline);
        self
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| PipelineError::catalog(format!("invalid catalog JSON: {}", e)))?;

        let courts = file
            .courts
            .into_iter()
            .map(|(court_id, entry)| {
                let cameras = entry
                    .cameras
                    .into_iter()
                    .map(|CameraId(id)| (id, CameraStatus::Offline))
                    .collect();
                (court_id, cameras)
            })
            .collect();

        Ok(Self {
            courts: RwLock::new(courts),
            permissive: false,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json(&json)?;
        info!("Loaded camera catalog from {}", path.display());
        Ok(catalog)
    }

    pub async fn status(&self, key: &StreamKey) -> Option<CameraStatus> {
        self.courts
            .read()
            .await
            .get(&key.court_id)
            .and_then(|cams| cams.get(&key.cam_id))
            .copied()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraCatalog for InMemoryCatalog {
    async fn contains(&self, key: &StreamKey) -> bool {
        if self.permissive {
            return true;
        }
        self.status(key).await.is_some()
    }

    async fn set_status(&self, key: &StreamKey, status: CameraStatus) -> PipelineResult<()> {
        let mut courts = self.courts.write().await;

        if self.permissive {
            courts
                .entry(key.court_id.clone())
                .or_default()
                .insert(key.cam_id.clone(), status);
            return Ok(());
        }

        match courts
            .get_mut(&key.court_id)
            .and_then(|cams| cams.get_mut(&key.cam_id))
        {
            Some(current) => {
                *current = status;
                Ok(())
            }
            None => {
                warn!(stream = %key, "Status update for camera missing from catalog");
                Err(PipelineError::UnknownStream(key.clone()))
            }
        }
    }

    async fn summary(&self) -> CatalogSummary {
        let courts = self.courts.read().await;
        CatalogSummary {
            courts: courts.len(),
            cameras: courts.values().map(HashMap::len).sum(),
        }
    }
}
