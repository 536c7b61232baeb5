//! Remote drowsiness detector client

use crate::monitoring::DetectResponse;
use crate::{DetectorConfig, DetectorError, DrowsinessClassifier, MonitoringResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Posts JPEG stills to the detector's `/detect` endpoint
pub struct HttpDrowsinessClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDrowsinessClassifier {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| DetectorError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!("{}/detect", config.classifier_url.trim_end_matches('/'));
        info!("Drowsiness classifier endpoint: {}", endpoint);

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DrowsinessClassifier for HttpDrowsinessClassifier {
    async fn classify(&self, jpeg: Vec<u8>) -> Result<MonitoringResult, DetectorError> {
        let start = Instant::now();
        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| DetectorError::Network(e.to_string()))?;
        let form = Form::new().part("image", part);

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Detector returned {}: {}", status, body);
            return Err(DetectorError::Network(format!(
                "Detector returned {}: {}",
                status, body
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;
        let response: DetectResponse = serde_json::from_slice(&body)
            .map_err(|e| DetectorError::Network(format!("Malformed response: {}", e)))?;
        let result = MonitoringResult::try_from(response)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Classified frame: {:?}", result
        );
        Ok(result)
    }
}
