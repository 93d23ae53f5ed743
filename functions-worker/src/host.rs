//! The worker's own HTTP surface (§4.3): `POST /` to invoke, `GET /healthz` for
//! liveness. Identical regardless of which [`FunctionLoader`] is active — this module
//! only ever talks to the trait, never to a mock fixture or a `node` child directly.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json};
use axum::routing::{any, get};
use axum::Router;
use chrono::Utc;
use functions_core::Trigger;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::loader::{FunctionLoader, InvocationInput, LoaderOutcome};

/// Everything the host needs for the one function it was spawned to serve.
pub struct WorkerState {
    pub short_name: String,
    pub entry_point: String,
    pub trigger: Trigger,
    pub timeout: Duration,
    pub loader: Arc<dyn FunctionLoader>,
    /// Flipped once an uncaught panic escapes the loader; read by the CLI/tests, not
    /// acted on by the host itself (the Supervisor observes process exit, per §4.3).
    pub crashed: Arc<AtomicBool>,
}

pub fn router(state: Arc<WorkerState>) -> Router {
    Router::new()
        .route("/", any(invoke_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn invoke_handler(
    State(state): State<Arc<WorkerState>>,
    method: Method,
    uri: Uri,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let execution_id = Uuid::new_v4().to_string();
    let input = build_input(&state.trigger, &method, &uri, &body, &execution_id);

    let loader = state.loader.clone();
    let entry_point = state.entry_point.clone();
    let invocation = tokio::spawn(async move { loader.invoke(&entry_point, input).await });

    let (status, response_body) = match tokio::time::timeout(state.timeout, invocation).await {
        Ok(Ok(outcome)) => outcome_to_response(&execution_id, outcome),
        Ok(Err(join_error)) => {
            // The loader task panicked: an uncaught fatal signal (§4.3). The process
            // exits after flushing logs; the Supervisor observes the exit and drops
            // the pool entry.
            state.crashed.store(true, Ordering::SeqCst);
            tracing::error!(
                function = %state.short_name,
                error = %join_error,
                "worker crashed while executing an invocation"
            );
            schedule_exit();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": {"code": 500, "status": "INTERNAL", "message": "function crashed"}}),
            )
        }
        Err(_elapsed) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"code": 500, "status": "INTERNAL", "message": "function execution attempt timed out"}}),
        ),
    };

    (status, Json(response_body))
}

fn build_input(
    trigger: &Trigger,
    method: &Method,
    uri: &Uri,
    body: &[u8],
    execution_id: &str,
) -> InvocationInput {
    if matches!(trigger, Trigger::Http) {
        return InvocationInput::Http {
            method: method.to_string(),
            path_tail: uri.path().to_owned(),
            query: uri.query().unwrap_or_default().to_owned(),
            body: serde_json::from_slice(body).unwrap_or(Value::Null),
        };
    }

    let envelope: Value = serde_json::from_slice(body).unwrap_or_else(|_| json!({}));
    InvocationInput::Event {
        event_id: envelope
            .get("eventId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| execution_id.to_owned()),
        timestamp: envelope
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
        event_type: envelope
            .get("eventType")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default(),
        resource: envelope
            .get("resource")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default(),
        data: envelope.get("data").cloned().unwrap_or(Value::Null),
    }
}

fn outcome_to_response(execution_id: &str, outcome: LoaderOutcome) -> (StatusCode, Value) {
    match outcome {
        LoaderOutcome::Response(result) => (
            StatusCode::OK,
            json!({"executionId": execution_id, "result": result}),
        ),
        LoaderOutcome::Error { message, stack } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "executionId": execution_id,
                "error": {"code": 500, "message": message, "stack": stack},
            }),
        ),
        LoaderOutcome::NoResponse | LoaderOutcome::Hang => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": {"code": 500, "status": "INTERNAL", "message": "function crashed"}}),
        ),
    }
}

fn schedule_exit() {
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockLoader;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state(short_name: &str, trigger: Trigger) -> Arc<WorkerState> {
        Arc::new(WorkerState {
            short_name: short_name.to_owned(),
            entry_point: short_name.to_owned(),
            trigger,
            timeout: Duration::from_millis(200),
            loader: Arc::new(MockLoader),
            crashed: Arc::new(AtomicBool::new(false)),
        })
    }

    #[tokio::test]
    async fn invoke_returns_result_for_http_trigger() {
        let app = router(state("hello", Trigger::Http));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invoke_times_out_for_a_slow_function() {
        let app = router(state("helloSlow", Trigger::Http));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = router(state("hello", Trigger::Http));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
