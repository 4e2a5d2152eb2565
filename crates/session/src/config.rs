use std::env;
use std::time::Duration;

use catalog::DEFAULT_SNAPSHOT_KEY;
use scene::interaction::DEFAULT_CLOSE_TOLERANCE_PX;
use streaming::{DEFAULT_ECHO_DELAY, DEFAULT_NDVI_DELAY, DEFAULT_OVERLAY_DEBOUNCE};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_WMS_TIME_RANGE: &str = "2024-05-03/2024-05-30";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Base URL of the polygon and index API, without a trailing slash.
    pub api_url: String,
    pub overlay_debounce: Duration,
    pub echo_delay: Duration,
    pub ndvi_delay: Duration,
    pub close_tolerance_px: f64,
    pub cache_key: String,
    /// `None` leaves requests without a client-side deadline.
    pub request_timeout: Option<Duration>,
    pub wms_time_range: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            overlay_debounce: DEFAULT_OVERLAY_DEBOUNCE,
            echo_delay: DEFAULT_ECHO_DELAY,
            ndvi_delay: DEFAULT_NDVI_DELAY,
            close_tolerance_px: DEFAULT_CLOSE_TOLERANCE_PX,
            cache_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            request_timeout: None,
            wms_time_range: DEFAULT_WMS_TIME_RANGE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `FIELDMAP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let ms = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(lookup(key), default.as_millis() as u64))
        };

        let timeout_ms = parse_or(lookup("FIELDMAP_REQUEST_TIMEOUT_MS"), 0u64);
        Self {
            api_url: lookup("FIELDMAP_API_URL")
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or(d.api_url),
            overlay_debounce: ms("FIELDMAP_OVERLAY_DEBOUNCE_MS", d.overlay_debounce),
            echo_delay: ms("FIELDMAP_ECHO_DELAY_MS", d.echo_delay),
            ndvi_delay: ms("FIELDMAP_NDVI_DELAY_MS", d.ndvi_delay),
            close_tolerance_px: parse_or(lookup("FIELDMAP_CLOSE_TOLERANCE_PX"), d.close_tolerance_px),
            cache_key: lookup("FIELDMAP_CACHE_KEY")
                .filter(|v| !v.is_empty())
                .unwrap_or(d.cache_key),
            request_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            ..d
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
