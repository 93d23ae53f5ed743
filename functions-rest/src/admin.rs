//! Supervisor-admin routes the distilled REST verb list (§4.5) doesn't name but the
//! CLI Controller's `prune`/`debug`/`reset` commands and daemon liveness polling need
//! somewhere to land (§4.7: "dials the daemon's REST or RPC endpoint"). Kept under
//! `/v1/admin/...` so they're visibly separate from the platform-compatible resource
//! verbs in `lib.rs` — these are local-emulator-only operations with no real-cloud
//! counterpart, analogous to the teacher's own `cargo func run` driving a local-only
//! host process that a real Azure deployment has no use for.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use functions_core::name;

use crate::{RestError, RestState};

pub fn router(state: RestState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/admin/workers", get(list_workers))
        .route("/v1/admin/prune", post(prune))
        .route(
            "/v1/admin/functions/:project/:location/:short/reset",
            post(reset_worker),
        )
        .route(
            "/v1/admin/functions/:project/:location/:short/debug",
            post(debug_worker),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_workers(State(state): State<RestState>) -> Json<Value> {
    Json(json!({ "workers": state.supervisor.snapshot() }))
}

async fn prune(State(state): State<RestState>) -> impl IntoResponse {
    state.supervisor.prune().await;
    Json(json!({}))
}

#[derive(Debug, Deserialize, Default)]
struct ResetBody {
    #[serde(default)]
    keep: bool,
}

async fn reset_worker(
    State(state): State<RestState>,
    Path((project, location, short)): Path<(String, String, String)>,
    Json(body): Json<ResetBody>,
) -> Result<Json<Value>, RestError> {
    let fqname = name::format_name(&project, &location, &short)?;
    state.registry.get(&fqname)?;
    state.supervisor.reset_handler(&fqname, body.keep).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
struct DebugBody {
    port: u16,
}

async fn debug_worker(
    State(state): State<RestState>,
    Path((project, location, short)): Path<(String, String, String)>,
    Json(body): Json<DebugBody>,
) -> Result<Json<Value>, RestError> {
    let fqname = name::format_name(&project, &location, &short)?;
    state.registry.get(&fqname)?;
    state.supervisor.debug_handler(&fqname, body.port).await?;
    Ok(Json(json!({ "port": body.port })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use functions_registry::Registry;
    use functions_supervisor::{Supervisor, SupervisorConfig};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoopProvisioner;
    #[async_trait::async_trait]
    impl functions_core::WorkerProvisioner for NoopProvisioner {
        async fn provision(&self, _function: &functions_core::Function) -> Result<(), functions_core::Error> {
            Ok(())
        }
        async fn teardown(&self, _name: &str) -> Result<(), functions_core::Error> {
            Ok(())
        }
    }

    async fn test_state() -> (RestState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::open(dir.path(), Arc::new(NoopProvisioner)).unwrap());
        let supervisor = Arc::new(Supervisor::new(registry.clone(), SupervisorConfig::default()));
        (RestState { registry, supervisor }, dir)
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (state, _dir) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_workers_on_an_empty_pool_is_empty() {
        let (state, _dir) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/v1/admin/workers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert!(value["workers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_on_an_unknown_function_is_not_found() {
        let (state, _dir) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/admin/functions/proj/us-central1/missing/reset")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
