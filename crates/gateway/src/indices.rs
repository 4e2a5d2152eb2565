//! Vegetation index endpoints: masked rasters and point NDVI.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use foundation::LatLng;
use reqwest::{Method, StatusCode};
use runtime::BoxFuture;
use serde::{Deserialize, Serialize};
use streaming::{NdviSource, RasterSource, SourceError};

use crate::error::RemoteError;
use crate::http::{Credentials, build_client};
use crate::wire::error_message_from;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NdviQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NdviResponse {
    #[serde(default)]
    pub ndvi: Option<f64>,
}

pub struct HttpIndexService {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<Credentials>,
}

impl HttpIndexService {
    pub fn new(base_url: impl Into<String>, credentials: Arc<Credentials>, timeout: Option<Duration>) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/indices{path}", self.base_url)
    }

    // Index endpoints report failures under `error` first.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
        let token = self.credentials.get().ok_or(SourceError::Unauthorized)?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::from(RemoteError::from(e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::warn!(status = status.as_u16(), "index service rejected credential");
            return Err(SourceError::Unauthorized);
        }
        let status_text = status.canonical_reason().unwrap_or("request failed").to_string();
        let body = resp.text().await.unwrap_or_default();
        Err(SourceError::Status {
            status: status.as_u16(),
            message: error_message_from(&status_text, &body, &["error", "message"]),
        })
    }
}

impl RasterSource for HttpIndexService {
    fn masked_index<'a>(
        &'a self,
        polygon_id: &'a str,
        layer_id: &'a str,
    ) -> BoxFuture<'a, Result<Bytes, SourceError>> {
        Box::pin(async move {
            let url = self.url(&format!("/masked-index/{polygon_id}/{layer_id}"));
            let resp = self.send(self.client.request(Method::GET, url)).await?;
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| SourceError::Network(e.to_string()))?;
            tracing::debug!(polygon_id, layer_id, size = bytes.len(), "masked index received");
            Ok(bytes)
        })
    }
}

impl NdviSource for HttpIndexService {
    fn ndvi_at(&self, point: LatLng) -> BoxFuture<'_, Result<Option<f64>, SourceError>> {
        Box::pin(async move {
            let query = NdviQuery {
                lat: point.lat,
                lon: point.lng,
            };
            let request = self.client.request(Method::POST, self.url("/ndvi")).json(&query);
            let resp = self.send(request).await?;
            let parsed: NdviResponse = resp
                .json()
                .await
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            Ok(parsed.ndvi.filter(|v| v.is_finite()))
        })
    }
}
