//! HTTP client for the polygon API.

use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use runtime::BoxFuture;
use scene::Polygon;

use crate::error::RemoteError;
use crate::remote::{PolygonRemote, require_server_id};
use crate::wire::{FetchReport, PolygonBody, decode_polygon_list, extract_error_message, parse_created_id};

/// Bearer credential shared by every client of one backend.
#[derive(Debug, Default)]
pub struct Credentials {
    token: RwLock<Option<String>>,
}

impl Credentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }

    pub fn set(&self, token: Option<String>) {
        *self.token.write() = token.filter(|t| !t.is_empty());
    }

    pub fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.token.read().is_some()
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!("falling back to default HTTP client: {e}");
        reqwest::Client::new()
    })
}

/// Send with the bearer token, mapping failures onto [`RemoteError`].
///
/// Returns `Auth` without touching the network when no token is set.
pub(crate) async fn send_authorized(
    credentials: &Credentials,
    request: RequestBuilder,
) -> Result<Response, RemoteError> {
    let token = credentials.get().ok_or(RemoteError::Auth)?;
    let resp = request.bearer_auth(token).send().await?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Maps a non-success status onto [`RemoteError`]. A rejected credential is
/// an auth failure like a missing one.
pub(crate) fn status_error(status: StatusCode, body: &str) -> RemoteError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        tracing::warn!(status = status.as_u16(), "credential rejected by server");
        return RemoteError::Auth;
    }
    let status_text = status.canonical_reason().unwrap_or("request failed");
    RemoteError::Request {
        status: status.as_u16(),
        message: extract_error_message(status_text, body),
    }
}

pub struct HttpPolygonRemote {
    client: reqwest::Client,
    base_url: String,
    credentials: std::sync::Arc<Credentials>,
}

impl HttpPolygonRemote {
    pub fn new(base_url: impl Into<String>, credentials: std::sync::Arc<Credentials>) -> Self {
        Self::with_timeout(base_url, credentials, None)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: std::sync::Arc<Credentials>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/polygons{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }
}

impl PolygonRemote for HttpPolygonRemote {
    fn create_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<String, RemoteError>> {
        Box::pin(async move {
            let body = PolygonBody::from_polygon(polygon)?;
            let resp = send_authorized(&self.credentials, self.request(Method::POST, "").json(&body)).await?;
            let text = resp.text().await?;
            let id = parse_created_id(&text)?;
            tracing::info!(temp_id = %polygon.id, server_id = %id, "polygon created");
            Ok(id)
        })
    }

    fn update_remote<'a>(&'a self, polygon: &'a Polygon) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            let server_id = require_server_id(polygon)?;
            let body = PolygonBody::from_polygon(polygon)?;
            let path = format!("/{server_id}");
            send_authorized(&self.credentials, self.request(Method::PUT, &path).json(&body)).await?;
            tracing::info!(server_id, "polygon updated");
            Ok(())
        })
    }

    fn delete_remote<'a>(&'a self, server_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move {
            let path = format!("/{server_id}");
            send_authorized(&self.credentials, self.request(Method::DELETE, &path)).await?;
            tracing::info!(server_id, "polygon deleted");
            Ok(())
        })
    }

    fn delete_all_remote(&self) -> BoxFuture<'_, Result<(), RemoteError>> {
        Box::pin(async move {
            send_authorized(&self.credentials, self.request(Method::DELETE, "/clear-all")).await?;
            tracing::info!("all polygons deleted");
            Ok(())
        })
    }

    fn fetch_all(&self) -> BoxFuture<'_, Result<FetchReport, RemoteError>> {
        Box::pin(async move {
            let resp = send_authorized(&self.credentials, self.request(Method::GET, "/my")).await?;
            let text = resp.text().await?;
            let report = decode_polygon_list(&text)?;
            tracing::info!(
                loaded = report.polygons.len(),
                discarded = report.discarded,
                "fetched polygons"
            );
            Ok(report)
        })
    }
}
