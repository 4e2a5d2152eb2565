//! Cursor read-out: coordinate echo plus NDVI under the pointer.
//!
//! The echo and the NDVI lookup are debounced independently, the echo short
//! and the lookup longer. NDVI is sampled only inside the selected field.

use std::sync::Arc;
use std::time::Duration;

use foundation::LatLng;
use parking_lot::Mutex;
use runtime::Debouncer;
use scene::Polygon;

use crate::source::NdviSource;

pub const DEFAULT_ECHO_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_NDVI_DELAY: Duration = Duration::from_millis(300);

const ERROR_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NdviReading {
    #[default]
    Idle,
    OutsideField,
    Loading,
    Value(f64),
    NoData,
    Error(String),
}

impl NdviReading {
    pub fn label(&self) -> String {
        match self {
            NdviReading::Idle => String::new(),
            NdviReading::OutsideField => "outside field".to_string(),
            NdviReading::Loading => "loading...".to_string(),
            NdviReading::Value(v) => format_ndvi(Some(*v)),
            NdviReading::NoData => format_ndvi(None),
            NdviReading::Error(msg) => format!("error: {msg}"),
        }
    }
}

/// What the info panel shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbePanel {
    pub visible: bool,
    pub coords: Option<LatLng>,
    pub ndvi: NdviReading,
}

impl ProbePanel {
    /// `"43.23895, 76.88971"`, or empty before the first echo.
    pub fn coords_label(&self) -> String {
        self.coords
            .map(|p| format!("{:.5}, {:.5}", p.lat, p.lng))
            .unwrap_or_default()
    }
}

pub fn format_ndvi(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "no data".to_string(),
    }
}

/// First 50 characters of an error message, with an ellipsis when cut.
pub fn truncate_error(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(ERROR_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub struct PointerProbe {
    source: Arc<dyn NdviSource>,
    panel: Arc<Mutex<ProbePanel>>,
    echo: Debouncer,
    ndvi: Debouncer,
}

impl PointerProbe {
    pub fn new(source: Arc<dyn NdviSource>, echo_delay: Duration, ndvi_delay: Duration) -> Self {
        Self {
            source,
            panel: Arc::new(Mutex::new(ProbePanel::default())),
            echo: Debouncer::new(echo_delay),
            ndvi: Debouncer::new(ndvi_delay),
        }
    }

    pub fn panel(&self) -> ProbePanel {
        self.panel.lock().clone()
    }

    /// Pointer moved over the map while not drawing.
    pub fn on_pointer_move(&mut self, point: LatLng, field: Option<&Polygon>) {
        self.panel.lock().visible = true;

        let panel = Arc::clone(&self.panel);
        self.echo.schedule(move |token| async move {
            let mut p = panel.lock();
            if token.is_live() {
                p.coords = Some(point);
            }
        });

        if !field.is_some_and(|f| f.contains(point)) {
            self.ndvi.cancel();
            self.panel.lock().ndvi = NdviReading::OutsideField;
            return;
        }

        let panel = Arc::clone(&self.panel);
        let source = Arc::clone(&self.source);
        self.ndvi.schedule(move |token| async move {
            {
                let mut p = panel.lock();
                if token.is_cancelled() {
                    return;
                }
                p.ndvi = NdviReading::Loading;
            }
            let result = source.ndvi_at(point).await;
            let mut p = panel.lock();
            if token.is_cancelled() {
                return;
            }
            p.ndvi = match result {
                Ok(Some(v)) => NdviReading::Value(v),
                Ok(None) => NdviReading::NoData,
                Err(e) => {
                    tracing::warn!(lat = point.lat, lng = point.lng, "NDVI lookup failed: {e}");
                    NdviReading::Error(truncate_error(&e.to_string()))
                }
            };
        });
    }

    /// Pointer left the map: hide the panel and drop pending lookups.
    pub fn on_pointer_out(&mut self) {
        self.echo.cancel();
        self.ndvi.cancel();
        let mut p = self.panel.lock();
        p.visible = false;
        if p.ndvi == NdviReading::Loading {
            p.ndvi = NdviReading::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use foundation::PolygonId;
    use pretty_assertions::assert_eq;
    use runtime::BoxFuture;

    struct FakeNdvi {
        value: Result<Option<f64>, SourceError>,
        calls: Mutex<Vec<LatLng>>,
    }

    impl FakeNdvi {
        fn returning(value: Result<Option<f64>, SourceError>) -> Arc<Self> {
            Arc::new(Self {
                value,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl NdviSource for FakeNdvi {
        fn ndvi_at(&self, point: LatLng) -> BoxFuture<'_, Result<Option<f64>, SourceError>> {
            Box::pin(async move {
                self.calls.lock().push(point);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.value.clone()
            })
        }
    }

    fn field() -> Polygon {
        Polygon {
            id: PolygonId::confirmed("1"),
            name: "f".into(),
            crop: None,
            coordinates: vec![
                LatLng::new(0.0, 0.0),
                LatLng::new(0.0, 1.0),
                LatLng::new(1.0, 1.0),
                LatLng::new(1.0, 0.0),
                LatLng::new(0.0, 0.0),
            ],
            color: 0,
            revision: 0,
        }
    }

    fn probe(source: Arc<FakeNdvi>) -> PointerProbe {
        PointerProbe::new(source, DEFAULT_ECHO_DELAY, DEFAULT_NDVI_DELAY)
    }

    #[tokio::test(start_paused = true)]
    async fn echo_settles_before_ndvi() {
        let source = FakeNdvi::returning(Ok(Some(0.123_456)));
        let mut p = probe(Arc::clone(&source));
        let f = field();

        p.on_pointer_move(LatLng::new(0.5, 0.5), Some(&f));
        tokio::time::sleep(Duration::from_millis(150)).await;
        let panel = p.panel();
        assert!(panel.visible);
        assert_eq!(panel.coords_label(), "0.50000, 0.50000");
        assert_eq!(panel.ndvi, NdviReading::Idle);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(p.panel().ndvi.label(), "0.1235");
        assert_eq!(source.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_moves_issue_one_lookup() {
        let source = FakeNdvi::returning(Ok(None));
        let mut p = probe(Arc::clone(&source));
        let f = field();

        for i in 0..5 {
            p.on_pointer_move(LatLng::new(0.1 * (i + 1) as f64, 0.5), Some(&f));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(*source.calls.lock(), vec![LatLng::new(0.5, 0.5)]);
        assert_eq!(p.panel().ndvi, NdviReading::NoData);
        assert_eq!(p.panel().coords, Some(LatLng::new(0.5, 0.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn outside_field_skips_lookup() {
        let source = FakeNdvi::returning(Ok(Some(0.5)));
        let mut p = probe(Arc::clone(&source));

        p.on_pointer_move(LatLng::new(5.0, 5.0), Some(&field()));
        p.on_pointer_move(LatLng::new(0.5, 0.5), None);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(source.calls.lock().is_empty());
        assert_eq!(p.panel().ndvi, NdviReading::OutsideField);
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_out_hides_and_cancels() {
        let source = FakeNdvi::returning(Ok(Some(0.5)));
        let mut p = probe(Arc::clone(&source));

        p.on_pointer_move(LatLng::new(0.5, 0.5), Some(&field()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        p.on_pointer_out();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!p.panel().visible);
        assert!(source.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_truncated() {
        let long = "x".repeat(80);
        let source = FakeNdvi::returning(Err(SourceError::Network(long)));
        let mut p = probe(source);

        p.on_pointer_move(LatLng::new(0.5, 0.5), Some(&field()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let NdviReading::Error(msg) = p.panel().ndvi else {
            panic!("expected an error reading");
        };
        assert_eq!(msg.chars().count(), 53);
        assert!(msg.starts_with("network error: "));
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_ndvi(Some(-0.25)), "-0.2500");
        assert_eq!(format_ndvi(None), "no data");
        assert_eq!(truncate_error("short"), "short");
    }
}
