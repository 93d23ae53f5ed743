//! The REST Front-End (C5, §4.5): a JSON HTTP gateway in front of the Registry and
//! Supervisor.
//!
//! Grounded on `other_examples`'s `tangle-network-faas-infra-blueprint` gateway
//! (`axum::Router` + `State` + `Path`/`Json` extractors wired directly onto a
//! supervisor-shaped backend) and on `golemcloud-golem`'s axum-based service crates for
//! the `/v1/...` versioned-resource route shape.

mod admin;
mod error;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use functions_core::model::SourceLocation;
use functions_core::{name, Function, Trigger};
use functions_registry::Registry;
use functions_supervisor::Supervisor;

pub use error::RestError;

/// Shared handles every REST handler closes over.
#[derive(Clone)]
pub struct RestState {
    pub registry: Arc<Registry>,
    pub supervisor: Arc<Supervisor>,
}

/// Builds the management API router (§4.5's `/v1/...` routes), served on `restPort`.
/// `state` is cheap to clone (two `Arc`s). Also carries the admin-only routes (§4.9's
/// "ambient stack" — `/healthz` liveness plus the `prune`/`reset`/`debug` operations the
/// CLI Controller's non-resource verbs need, see `admin.rs`) so the CLI only ever has
/// one REST port to dial.
pub fn router(state: RestState) -> Router {
    Router::new()
        .route(
            "/v1/projects/:project/locations/:location/functions",
            get(list_functions).post(create_function),
        )
        .route(
            "/v1/projects/:project/locations/:location/functions:generateUploadUrl",
            post(generate_upload_url),
        )
        .route(
            "/v1/projects/:project/locations/:location/functions/:name",
            get(get_function).delete(delete_function).post(call_or_reject),
        )
        .route("/v1/operations/:id", get(get_operation))
        .with_state(state.clone())
        .merge(admin::router(state))
}

/// Builds the invocation router (§4.5's `GET /{p}/{region}/{short}[/tail…]` route),
/// served on its own `supervisorPort` listener, separate from the management API.
pub fn invocation_router(state: RestState) -> Router {
    Router::new()
        .route("/:project/:region/:short", any(direct_proxy))
        .route("/:project/:region/:short/*tail", any(direct_proxy))
        .with_state(state)
}

/// A wire-format [`Function`] create request: the same shape produced by a `get`, minus
/// the fully-qualified `name` (derived from the path's `project`/`location` plus the
/// body's own `shortName`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFunctionRequest {
    short_name: String,
    trigger: Trigger,
    source: SourceLocation,
    entry_point: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page_size: Option<usize>,
}

async fn list_functions(
    State(state): State<RestState>,
    Path((project, location)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, RestError> {
    let prefix = name::format_location(&project, &location);
    let functions = state.registry.list(&prefix, query.page_size);
    Ok(Json(json!({ "functions": functions })))
}

async fn create_function(
    State(state): State<RestState>,
    Path((project, location)): Path<(String, String)>,
    Json(body): Json<CreateFunctionRequest>,
) -> Result<(StatusCode, Json<Value>), RestError> {
    let function = Function::new(
        &project,
        &location,
        &body.short_name,
        body.trigger,
        body.source,
        body.entry_point,
        body.timeout_ms.map(std::time::Duration::from_millis),
        body.env,
    )?;
    let op = state.registry.create(function)?;
    Ok((StatusCode::OK, Json(serde_json::to_value(op).expect("operation serializes"))))
}

async fn get_function(
    State(state): State<RestState>,
    Path((project, location, short)): Path<(String, String, String)>,
) -> Result<Json<Value>, RestError> {
    let fqname = name::format_name(&project, &location, &short)?;
    let function = state.registry.get(&fqname)?;
    Ok(Json(serde_json::to_value(function).expect("function serializes")))
}

async fn delete_function(
    State(state): State<RestState>,
    Path((project, location, short)): Path<(String, String, String)>,
) -> Result<Json<Value>, RestError> {
    let fqname = name::format_name(&project, &location, &short)?;
    let op = state.registry.delete(&fqname)?;
    Ok(Json(serde_json::to_value(op).expect("operation serializes")))
}

async fn get_operation(
    State(state): State<RestState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, RestError> {
    let op_name = format!("operations/{}", id);
    let op = state.registry.get_operation(&op_name)?;
    Ok(Json(serde_json::to_value(op).expect("operation serializes")))
}

async fn generate_upload_url(
    Path((_project, _location)): Path<(String, String)>,
) -> Json<Value> {
    // Cloud storage staging is out of scope (§1); this is the stub URL the spec calls
    // for so deploy tooling has something to `PUT` against in local development.
    Json(json!({
        "uploadUrl": format!("http://localhost/stub-upload/{}", uuid::Uuid::new_v4()),
    }))
}

/// `POST .../functions/{name}` only ever means `{name}:call` on this front-end (§4.5);
/// anything else at this path+verb isn't a route the real service exposes either.
async fn call_or_reject(
    State(state): State<RestState>,
    Path((project, location, name_segment)): Path<(String, String, String)>,
    Json(body): Json<CallRequest>,
) -> Result<Response, RestError> {
    let Some(short) = name_segment.strip_suffix(":call") else {
        return Err(functions_core::Error::not_found(format!(
            "Function '{}' does not support POST.",
            name_segment
        ))
        .into());
    };
    call_function(state, project, location, short.to_owned(), body).await
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CallRequest {
    #[serde(default)]
    data: Value,
    resource: Option<String>,
    event_type: Option<String>,
    auth: Option<Value>,
}

/// `:call` (§4.5): synthesises an invocation the way the CLI's own `call` command does
/// — HTTP-trigger functions see a synthetic `POST /` with `data` as the body;
/// event-trigger functions see the usual envelope, with the function's own trigger
/// values substituted for an omitted `resource`/`eventType`, and (for a Firebase
/// Realtime Database trigger) a default `{admin: true}` auth context.
async fn call_function(
    state: RestState,
    project: String,
    location: String,
    short: String,
    body: CallRequest,
) -> Result<Response, RestError> {
    let fqname = name::format_name(&project, &location, &short)?;
    let function = state.registry.get(&fqname)?;

    let forwarded_body = match &function.trigger {
        Trigger::Http => serde_json::to_vec(&body.data),
        _ => {
            let (resource, event_type, service) = match &function.trigger {
                Trigger::PubSub { topic } => (topic.clone(), "google.pubsub.topic.publish".to_owned(), None),
                Trigger::Storage { bucket } => {
                    (bucket.clone(), "google.storage.object.finalize".to_owned(), None)
                }
                Trigger::Event { event_type, resource, service } => {
                    (resource.clone(), event_type.clone(), service.clone())
                }
                Trigger::Http => unreachable!(),
            };
            let is_firebase_database = service.as_deref() == Some("firebase.database");
            let auth = body.auth.clone().unwrap_or_else(|| {
                if is_firebase_database {
                    json!({ "admin": true })
                } else {
                    Value::Null
                }
            });
            serde_json::to_vec(&json!({
                "eventId": uuid::Uuid::new_v4().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "eventType": body.event_type.unwrap_or(event_type),
                "resource": body.resource.unwrap_or(resource),
                "auth": auth,
                "data": body.data,
            }))
        }
    }
    .expect("call envelope always serialises");

    let response = state
        .supervisor
        .invoke(
            &fqname,
            Method::POST,
            "/",
            "",
            HeaderMap::new(),
            forwarded_body.into(),
        )
        .await?;

    Ok(proxy_response_to_http(response, parse_result_and_error_strings))
}

/// §4.5: "`result` and `error` inside a response body are JSON-parsed if they are
/// strings that happen to be JSON — a convenience for clients."
fn parse_result_and_error_strings(body: &Bytes) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(body).ok()?;
    let mut changed = false;
    for field in ["result", "error"] {
        if let Some(Value::String(s)) = value.get(field) {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                value[field] = parsed;
                changed = true;
            }
        }
    }
    changed.then(|| serde_json::to_vec(&value).expect("re-serialising a parsed value always succeeds"))
}

async fn direct_proxy(
    State(state): State<RestState>,
    method: Method,
    Path(path_params): Path<HashMap<String, String>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RestError> {
    let project = path_params.get("project").expect("route always captures :project");
    let region = path_params.get("region").expect("route always captures :region");
    let short = path_params.get("short").expect("route always captures :short");
    let tail = path_params.get("tail").map(String::as_str).unwrap_or("");

    let fqname = name::format_name(project, region, short)?;
    let path_tail = if tail.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", tail)
    };
    let query = uri.query().unwrap_or_default().to_owned();

    let response = state
        .supervisor
        .invoke(&fqname, method, &path_tail, &query, headers, body)
        .await?;
    Ok(proxy_response_to_http(response, |_| None))
}

fn proxy_response_to_http(
    response: functions_supervisor::ProxyResponse,
    rewrite_body: impl FnOnce(&Bytes) -> Option<Vec<u8>>,
) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = rewrite_body(&response.body).map(Bytes::from).unwrap_or(response.body);
    let mut builder = Response::builder().status(status);
    *builder.headers_mut().expect("builder has no error yet") = response.headers;
    builder
        .body(axum::body::Body::from(body))
        .expect("proxied response always builds")
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        error::into_response(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use functions_supervisor::SupervisorConfig;
    use tower::ServiceExt;

    struct NoopProvisioner;
    #[async_trait::async_trait]
    impl functions_core::WorkerProvisioner for NoopProvisioner {
        async fn provision(&self, _function: &Function) -> Result<(), functions_core::Error> {
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
    async fn create_then_get_round_trips_over_http() {
        let (state, _dir) = test_state().await;
        let app = router(state);

        let create_body = json!({
            "shortName": "hello",
            "trigger": {"kind": "http"},
            "source": {"kind": "localPath", "path": "./fixture"},
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/projects/proj/locations/us-central1/functions")
                    .header("content-type", "application/json")
                    .body(Body::from(create_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/projects/proj/locations/us-central1/functions/hello")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_function_is_not_found() {
        let (state, _dir) = test_state().await;
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/projects/proj/locations/us-central1/functions/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_short_name_is_a_bad_request() {
        let (state, _dir) = test_state().await;
        let app = router(state);
        let create_body = json!({
            "shortName": "1-invalid",
            "trigger": {"kind": "http"},
            "source": {"kind": "localPath", "path": "./fixture"},
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/projects/proj/locations/us-central1/functions")
                    .header("content-type", "application/json")
                    .body(Body::from(create_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn parses_json_strings_inside_result_and_error() {
        let body = Bytes::from(r#"{"result": "{\"foo\":\"bar\"}"}"#);
        let rewritten = parse_result_and_error_strings(&body).unwrap();
        let value: Value = serde_json::from_slice(&rewritten).unwrap();
        assert_eq!(value["result"]["foo"], "bar");
    }

    #[tokio::test]
    async fn direct_proxy_route_rejects_an_unknown_function_before_touching_the_supervisor() {
        let (state, _dir) = test_state().await;
        let app = invocation_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/proj/us-central1/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
