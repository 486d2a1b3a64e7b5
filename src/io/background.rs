//! Background location task adapter
//!
//! The platform invokes a globally registered task with an opaque payload,
//! either `{"locations": [...]}` or `{"error": ...}`. The adapter converts the
//! payload into fixes and forwards them to the engine. It knows nothing about
//! how the task was scheduled.

use crate::domain::types::LocationFix;
use crate::infra::metrics::Metrics;
use crate::io::location::{FixHandler, FixOutcome};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BackgroundTaskError {
    #[error("background task reported an error: {0}")]
    Task(String),
    #[error("malformed background payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("background payload carried no locations")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct TaskPayload {
    #[serde(default)]
    locations: Vec<TaskLocation>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TaskLocation {
    coords: TaskCoords,
    /// Epoch milliseconds; some platforms send a float
    timestamp: f64,
}

#[derive(Debug, Deserialize)]
struct TaskCoords {
    latitude: f64,
    longitude: f64,
}

/// Render an `error` field that may be a string or an object with `message`
fn error_message(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

/// Forwards background task invocations into the engine
pub struct BackgroundTaskAdapter {
    task_id: String,
    handler: Arc<dyn FixHandler>,
    metrics: Arc<Metrics>,
}

impl BackgroundTaskAdapter {
    pub fn new(task_id: impl Into<String>, handler: Arc<dyn FixHandler>, metrics: Arc<Metrics>) -> Self {
        Self { task_id: task_id.into(), handler, metrics }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Handle a raw JSON payload string
    pub fn handle_raw(&self, raw: &str) -> Result<Vec<FixOutcome>, BackgroundTaskError> {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => self.handle_payload(value),
            Err(e) => Err(self.fail(BackgroundTaskError::Payload(e))),
        }
    }

    /// Handle one task invocation
    ///
    /// Locations inside a batch are delivered oldest first. Task errors and
    /// malformed payloads are logged, counted and returned to the caller.
    pub fn handle_payload(
        &self,
        payload: serde_json::Value,
    ) -> Result<Vec<FixOutcome>, BackgroundTaskError> {
        let payload: TaskPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Err(self.fail(BackgroundTaskError::Payload(e))),
        };

        if let Some(ref error) = payload.error {
            return Err(self.fail(BackgroundTaskError::Task(error_message(error))));
        }
        if payload.locations.is_empty() {
            return Err(self.fail(BackgroundTaskError::Empty));
        }

        let mut fixes: Vec<LocationFix> = payload
            .locations
            .iter()
            .map(|l| {
                LocationFix::new(l.coords.latitude, l.coords.longitude, l.timestamp.max(0.0) as u64)
            })
            .collect();
        fixes.sort_by_key(|f| f.timestamp);

        let outcomes: Vec<FixOutcome> = fixes.into_iter().map(|f| self.handler.handle_fix(f)).collect();
        debug!(task_id = %self.task_id, fixes = %outcomes.len(), "background_task_handled");
        Ok(outcomes)
    }

    fn fail(&self, error: BackgroundTaskError) -> BackgroundTaskError {
        self.metrics.record_background_task_error();
        warn!(task_id = %self.task_id, error = %error, "background_task_failed");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        fixes: Mutex<Vec<LocationFix>>,
    }

    impl FixHandler for Recorder {
        fn handle_fix(&self, fix: LocationFix) -> FixOutcome {
            self.fixes.lock().push(fix);
            FixOutcome::Processed { transitions: 0 }
        }
    }

    fn adapter() -> (BackgroundTaskAdapter, Arc<Recorder>, Arc<Metrics>) {
        let recorder = Arc::new(Recorder::default());
        let metrics = Arc::new(Metrics::new());
        let adapter = BackgroundTaskAdapter::new("bg", recorder.clone(), metrics.clone());
        (adapter, recorder, metrics)
    }

    #[test]
    fn test_locations_forwarded_oldest_first() {
        let (adapter, recorder, _) = adapter();
        let payload = json!({
            "locations": [
                {"coords": {"latitude": 1.0, "longitude": 2.0}, "timestamp": 2000.0},
                {"coords": {"latitude": 3.0, "longitude": 4.0}, "timestamp": 1000}
            ]
        });

        let outcomes = adapter.handle_payload(payload).unwrap();

        assert_eq!(outcomes.len(), 2);
        let fixes = recorder.fixes.lock();
        assert_eq!(fixes[0], LocationFix::new(3.0, 4.0, 1000));
        assert_eq!(fixes[1], LocationFix::new(1.0, 2.0, 2000));
    }

    #[test]
    fn test_task_error_surfaced() {
        let (adapter, recorder, metrics) = adapter();

        let err = adapter
            .handle_payload(json!({"error": {"code": 1, "message": "location services off"}}))
            .unwrap_err();

        assert!(matches!(err, BackgroundTaskError::Task(ref m) if m == "location services off"));
        assert!(recorder.fixes.lock().is_empty());
        assert_eq!(metrics.background_task_errors(), 1);
    }

    #[test]
    fn test_malformed_payload_surfaced() {
        let (adapter, _, metrics) = adapter();

        let err = adapter.handle_payload(json!({"locations": [{"lat": 1.0}]})).unwrap_err();
        assert!(matches!(err, BackgroundTaskError::Payload(_)));

        let err = adapter.handle_raw("not json").unwrap_err();
        assert!(matches!(err, BackgroundTaskError::Payload(_)));

        assert_eq!(metrics.background_task_errors(), 2);
    }

    #[test]
    fn test_empty_payload_surfaced() {
        let (adapter, _, _) = adapter();
        let err = adapter.handle_raw(r#"{"locations": []}"#).unwrap_err();
        assert!(matches!(err, BackgroundTaskError::Empty));
    }

    #[test]
    fn test_string_error() {
        let (adapter, _, _) = adapter();
        let err = adapter.handle_payload(json!({"error": "denied"})).unwrap_err();
        assert_eq!(err.to_string(), "background task reported an error: denied");
    }
}
