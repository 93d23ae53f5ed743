//! The RPC Front-End (C6, §4.6): mirrors the REST verbs (§4.5) over `tonic`/`prost`
//! binary framing, with typed error details carried in `detail-bin` trailing metadata.
//!
//! Grounded on the teacher's `azure-functions-shared/build.rs` (protoc-driven codegen
//! checked in alongside the crate that serves it) and `golemcloud-golem`'s
//! `golem-api-grpc` (`tonic-build` + `prost`, trailing-metadata error detail encoding) —
//! `tonic`/`prost` being the direct modern successor of the teacher's own
//! `tower-grpc`/hand-rolled `protoc_grpcio` stack.

mod convert;
mod detail;

use std::sync::Arc;
use tonic::{Request, Response, Status};

use functions_core::Error;
use functions_registry::Registry;
use functions_supervisor::Supervisor;

tonic::include_proto!("functions.v1");

pub use functions_service_server::{FunctionsService, FunctionsServiceServer};

/// The sentinel location a `listFunctions` liveness probe uses (§4.6).
const HEARTBEAT_LOCATION: &str = "heartbeat";

/// The RPC front-end's service implementation: identical backing state to the REST
/// front-end (`functions_rest::RestState`), just a different wire format on top.
pub struct RpcService {
    pub registry: Arc<Registry>,
    pub supervisor: Arc<Supervisor>,
}

impl RpcService {
    pub fn new(registry: Arc<Registry>, supervisor: Arc<Supervisor>) -> Self {
        RpcService { registry, supervisor }
    }

    pub fn into_server(self) -> FunctionsServiceServer<Self> {
        FunctionsServiceServer::new(self)
    }
}

fn status_of(error: Error) -> Status {
    detail::error_to_status(&error)
}

#[tonic::async_trait]
impl FunctionsService for RpcService {
    async fn create_function(
        &self,
        request: Request<CreateFunctionRequest>,
    ) -> Result<Response<OperationMessage>, Status> {
        let req = request.into_inner();
        let msg = req.function.ok_or_else(|| {
            status_of(Error::invalid_argument(
                "CreateFunctionRequest.function is required.",
                vec![],
            ))
        })?;
        let function = convert::message_to_function(&req.project, &req.location, &msg)
            .map_err(status_of)?;
        let op = self.registry.create(function).map_err(status_of)?;
        Ok(Response::new(convert::operation_to_message(&op)))
    }

    async fn delete_function(
        &self,
        request: Request<DeleteFunctionRequest>,
    ) -> Result<Response<OperationMessage>, Status> {
        let req = request.into_inner();
        let op = self.registry.delete(&req.name).map_err(status_of)?;
        Ok(Response::new(convert::operation_to_message(&op)))
    }

    async fn get_function(
        &self,
        request: Request<GetFunctionRequest>,
    ) -> Result<Response<FunctionMessage>, Status> {
        let req = request.into_inner();
        let function = self.registry.get(&req.name).map_err(status_of)?;
        Ok(Response::new(convert::function_to_message(&function)))
    }

    async fn list_functions(
        &self,
        request: Request<ListFunctionsRequest>,
    ) -> Result<Response<ListFunctionsResponse>, Status> {
        let req = request.into_inner();
        if req.location == HEARTBEAT_LOCATION {
            // §4.6: a liveness probe, not a real listing — always answer empty.
            return Ok(Response::new(ListFunctionsResponse { functions: vec![] }));
        }
        let page_size = (req.page_size > 0).then(|| req.page_size as usize);
        let functions = self
            .registry
            .list(&req.location, page_size)
            .iter()
            .map(convert::function_to_message)
            .collect();
        Ok(Response::new(ListFunctionsResponse { functions }))
    }

    async fn get_operation(
        &self,
        request: Request<GetOperationRequest>,
    ) -> Result<Response<OperationMessage>, Status> {
        let req = request.into_inner();
        let op = self.registry.get_operation(&req.name).map_err(status_of)?;
        Ok(Response::new(convert::operation_to_message(&op)))
    }

    async fn call_function(
        &self,
        request: Request<CallFunctionRequest>,
    ) -> Result<Response<CallFunctionResponse>, Status> {
        let req = request.into_inner();
        let data: serde_json::Value =
            serde_json::from_str(&req.data_json).unwrap_or(serde_json::Value::Null);

        let function = self.registry.get(&req.name).map_err(status_of)?;
        let body = match &function.trigger {
            functions_core::Trigger::Http => serde_json::to_vec(&data),
            _ => {
                let (default_resource, default_event_type) = match &function.trigger {
                    functions_core::Trigger::PubSub { topic } => {
                        (topic.clone(), "google.pubsub.topic.publish".to_owned())
                    }
                    functions_core::Trigger::Storage { bucket } => {
                        (bucket.clone(), "google.storage.object.finalize".to_owned())
                    }
                    functions_core::Trigger::Event { event_type, resource, .. } => {
                        (resource.clone(), event_type.clone())
                    }
                    functions_core::Trigger::Http => unreachable!(),
                };
                serde_json::to_vec(&serde_json::json!({
                    "eventId": uuid_v4_like(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "eventType": if req.event_type.is_empty() { default_event_type } else { req.event_type },
                    "resource": if req.resource.is_empty() { default_resource } else { req.resource },
                    "data": data,
                }))
            }
        }
        .expect("call envelope always serialises");

        let response = self
            .supervisor
            .invoke(
                &req.name,
                http::Method::POST,
                "/",
                "",
                http::HeaderMap::new(),
                body.into(),
            )
            .await
            .map_err(status_of)?;

        Ok(Response::new(CallFunctionResponse {
            status: response.status as u32,
            body_json: String::from_utf8_lossy(&response.body).into_owned(),
        }))
    }
}

/// Avoids depending on `uuid` in this crate solely for one RPC-path event id; good
/// enough entropy for a local-emulator event identifier, not a security primitive.
fn uuid_v4_like() -> String {
    format!("{:x}", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use functions_supervisor::SupervisorConfig;

    struct NoopProvisioner;
    #[async_trait::async_trait]
    impl functions_core::WorkerProvisioner for NoopProvisioner {
        async fn provision(&self, _function: &functions_core::Function) -> Result<(), Error> {
            Ok(())
        }
        async fn teardown(&self, _name: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn service() -> (RpcService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(Registry::open(dir.path(), Arc::new(NoopProvisioner)).unwrap());
        let supervisor = Arc::new(Supervisor::new(registry.clone(), SupervisorConfig::default()));
        (RpcService::new(registry, supervisor), dir)
    }

    #[tokio::test]
    async fn create_then_get_round_trips_over_rpc() {
        let (service, _dir) = service();

        let message = FunctionMessage {
            name: "hello".to_owned(),
            trigger_kind: "http".to_owned(),
            source_kind: "localPath".to_owned(),
            source_location: "./fixture".to_owned(),
            ..Default::default()
        };
        let create_request = Request::new(CreateFunctionRequest {
            project: "proj".to_owned(),
            location: "us-central1".to_owned(),
            function: Some(message),
        });
        let op = service.create_function(create_request).await.unwrap().into_inner();
        assert!(!op.done);

        let get_request = Request::new(GetFunctionRequest {
            name: "projects/proj/locations/us-central1/functions/hello".to_owned(),
        });
        let function = service.get_function(get_request).await.unwrap().into_inner();
        assert_eq!(function.trigger_kind, "http");
    }

    #[tokio::test]
    async fn heartbeat_listing_is_always_empty() {
        let (service, _dir) = service();
        let request = Request::new(ListFunctionsRequest {
            location: HEARTBEAT_LOCATION.to_owned(),
            page_size: 0,
        });
        let response = service.list_functions(request).await.unwrap().into_inner();
        assert!(response.functions.is_empty());
    }

    #[tokio::test]
    async fn get_missing_function_is_not_found_with_detail_bin_absent() {
        let (service, _dir) = service();
        let request = Request::new(GetFunctionRequest { name: "projects/p/locations/l/functions/missing".to_owned() });
        let status = service.get_function(request).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
