//! ML service HTTP client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::{
    BounceRequest, BounceResponse, DetectRequest, DetectResponse, DetectionBox, HealthResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries of a failed health check. Frame calls are never retried.
    pub max_retries: u32,
    /// Minimum detector confidence
    pub detector_confidence: f32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
            detector_confidence: 0.25,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            detector_confidence: std::env::var("DETECTOR_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .filter(|c| (0.0..=1.0).contains(c))
                .unwrap_or(defaults.detector_confidence),
        }
    }
}

/// Client for the detector/classifier service.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        let result = self
            .with_retry(|| async {
                let response = self.http.get(&url).send().await.map_err(MlError::Network)?;
                check_status(response).await
            })
            .await;

        match result {
            Ok(response) => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Err(e) => {
                warn!("ML service health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Run the detector on one JPEG frame and return every box above the
    /// configured confidence.
    pub async fn detect(&self, jpeg: &[u8]) -> MlResult<Vec<DetectionBox>> {
        let request = DetectRequest {
            image_b64: STANDARD.encode(jpeg),
            confidence: self.config.detector_confidence,
        };
        let response: DetectResponse = self.post_json("/detect", &request).await?;

        debug!("Detector returned {} boxes", response.detections.len());
        Ok(response.detections)
    }

    /// Bounce probability for a normalised window of positions.
    pub async fn bounce_probability(&self, window: &[[f32; 2]]) -> MlResult<f32> {
        let request = BounceRequest {
            window: window.to_vec(),
        };
        let response: BounceResponse = self.post_json("/bounce", &request).await?;

        let p = response.probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(MlError::invalid_response(format!(
                "bounce probability {} outside [0, 1]",
                p
            )));
        }
        Ok(p)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);

        // Single attempt, bounded by the client timeout.
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(MlError::Network)?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| MlError::invalid_response(format!("{} returned bad JSON: {}", path, e)))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        Err(MlError::ServiceUnavailable(format!("{}: {}", status, body)))
    } else {
        Err(MlError::RequestFailed(format!(
            "ML service returned {}: {}",
            status, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.detector_confidence, 0.25);
        assert_eq!(config.max_retries, 1);
    }
}
