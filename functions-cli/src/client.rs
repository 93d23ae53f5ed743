//! Dials the daemon over REST or RPC per the persisted `service` config option (§4.7).
//! Resource CRUD and invocation go through whichever front-end `service` names; the
//! admin-only operations (`prune`/`reset`/`debug`, liveness) always go over REST, since
//! no RPC equivalent was ever grounded in `functions.proto` — recorded as an Open
//! Question decision in `DESIGN.md`.

use serde_json::{json, Value};

use functions_core::config::Config;
use functions_rpc::{
    functions_service_client::FunctionsServiceClient, CallFunctionRequest, CreateFunctionRequest,
    DeleteFunctionRequest, FunctionMessage, GetFunctionRequest, GetOperationRequest, ListFunctionsRequest,
};

use crate::failure::Failure;

/// A view of a created/deleted function's long-running [`functions_core::model::Operation`],
/// normalised across the REST and RPC wire shapes so the command layer only deals with
/// one type.
pub struct OperationView {
    pub name: String,
    pub done: bool,
    pub error: Option<String>,
}

pub struct Client {
    http: reqwest::Client,
    rest_base: String,
    pub invocation_base: String,
    grpc_base: String,
    service: String,
}

impl Client {
    pub fn new(config: &Config) -> Self {
        let host = config.host();
        Client {
            http: reqwest::Client::new(),
            rest_base: format!("http://{}:{}", host, config.rest_port()),
            invocation_base: format!("http://{}:{}", host, config.supervisor_port()),
            grpc_base: format!("http://{}:{}", host, config.grpc_port()),
            service: config.service(),
        }
    }

    pub fn invocation_url(&self, project: &str, location: &str, short: &str) -> String {
        format!("{}/{}/{}/{}", self.invocation_base, project, location, short)
    }

    /// Polls `GET /healthz` until it succeeds or `deadline` elapses.
    pub async fn wait_until_healthy(&self, deadline: std::time::Duration) -> bool {
        let start = std::time::Instant::now();
        loop {
            if self.healthz().await {
                return true;
            }
            if start.elapsed() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    pub async fn healthz(&self) -> bool {
        self.http
            .get(format!("{}/healthz", self.rest_base))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn rest_ok(response: reqwest::Response) -> Result<Value, Failure> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            Ok(body)
        } else {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("the daemon returned an error")
                .to_owned();
            Err(Failure::Operational(message))
        }
    }

    pub async fn create_function(
        &self,
        project: &str,
        location: &str,
        body: Value,
    ) -> Result<OperationView, Failure> {
        match self.service.as_str() {
            "grpc" => {
                let message = function_message_from_rest_body(&body);
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let response = client
                    .create_function(CreateFunctionRequest {
                        project: project.to_owned(),
                        location: location.to_owned(),
                        function: Some(message),
                    })
                    .await?
                    .into_inner();
                Ok(operation_view_from_message(response))
            }
            _ => {
                let url = format!("{}/v1/projects/{}/locations/{}/functions", self.rest_base, project, location);
                let response = self.http.post(url).json(&body).send().await?;
                let op = Self::rest_ok(response).await?;
                Ok(operation_view_from_rest(&op))
            }
        }
    }

    pub async fn delete_function(&self, project: &str, location: &str, short: &str) -> Result<OperationView, Failure> {
        match self.service.as_str() {
            "grpc" => {
                let name = functions_core::name::format_name(project, location, short)?;
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let response = client
                    .delete_function(DeleteFunctionRequest { name })
                    .await?
                    .into_inner();
                Ok(operation_view_from_message(response))
            }
            _ => {
                let url = format!(
                    "{}/v1/projects/{}/locations/{}/functions/{}",
                    self.rest_base, project, location, short
                );
                let response = self.http.delete(url).send().await?;
                let op = Self::rest_ok(response).await?;
                Ok(operation_view_from_rest(&op))
            }
        }
    }

    pub async fn get_function(&self, project: &str, location: &str, short: &str) -> Result<Value, Failure> {
        match self.service.as_str() {
            "grpc" => {
                let name = functions_core::name::format_name(project, location, short)?;
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let message = client.get_function(GetFunctionRequest { name }).await?.into_inner();
                Ok(function_message_to_json(&message))
            }
            _ => {
                let url = format!(
                    "{}/v1/projects/{}/locations/{}/functions/{}",
                    self.rest_base, project, location, short
                );
                let response = self.http.get(url).send().await?;
                Self::rest_ok(response).await
            }
        }
    }

    pub async fn list_functions(
        &self,
        project: &str,
        location: &str,
        page_size: Option<usize>,
    ) -> Result<Vec<Value>, Failure> {
        match self.service.as_str() {
            "grpc" => {
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let response = client
                    .list_functions(ListFunctionsRequest {
                        location: functions_core::name::format_location(project, location),
                        page_size: page_size.unwrap_or(0) as u32,
                    })
                    .await?
                    .into_inner();
                Ok(response.functions.iter().map(function_message_to_json).collect())
            }
            _ => {
                let mut url = format!(
                    "{}/v1/projects/{}/locations/{}/functions",
                    self.rest_base, project, location
                );
                if let Some(page_size) = page_size {
                    url = format!("{}?pageSize={}", url, page_size);
                }
                let response = self.http.get(url).send().await?;
                let body = Self::rest_ok(response).await?;
                Ok(body["functions"].as_array().cloned().unwrap_or_default())
            }
        }
    }

    pub async fn call_function(
        &self,
        project: &str,
        location: &str,
        short: &str,
        data: Value,
        resource: Option<String>,
        event_type: Option<String>,
    ) -> Result<(u16, Value), Failure> {
        match self.service.as_str() {
            "grpc" => {
                let name = functions_core::name::format_name(project, location, short)?;
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let response = client
                    .call_function(CallFunctionRequest {
                        name,
                        data_json: data.to_string(),
                        resource: resource.unwrap_or_default(),
                        event_type: event_type.unwrap_or_default(),
                        auth_json: String::new(),
                    })
                    .await?
                    .into_inner();
                let body: Value = serde_json::from_str(&response.body_json).unwrap_or(Value::Null);
                Ok((response.status as u16, body))
            }
            _ => {
                let url = format!(
                    "{}/v1/projects/{}/locations/{}/functions/{}:call",
                    self.rest_base, project, location, short
                );
                let mut body = json!({ "data": data });
                if let Some(resource) = resource {
                    body["resource"] = json!(resource);
                }
                if let Some(event_type) = event_type {
                    body["eventType"] = json!(event_type);
                }
                let response = self.http.post(url).json(&body).send().await?;
                let status = response.status().as_u16();
                let body: Value = response.json().await.unwrap_or(Value::Null);
                Ok((status, body))
            }
        }
    }

    /// Polls `GET /v1/operations/{id}` (RPC: `GetOperation`) until `done`, bounded by
    /// `deadline` (§6 "timeout"). Always dials whichever `service` created the operation,
    /// since operation ids aren't cross-front-end portable in either wire shape used here.
    pub async fn wait_for_operation(
        &self,
        operation_name: &str,
        deadline: std::time::Duration,
    ) -> Result<OperationView, Failure> {
        let start = std::time::Instant::now();
        loop {
            let view = self.get_operation(operation_name).await?;
            if view.done {
                return Ok(view);
            }
            if start.elapsed() >= deadline {
                return Err(Failure::Operational(format!(
                    "timed out waiting for {} to complete",
                    operation_name
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        }
    }

    async fn get_operation(&self, operation_name: &str) -> Result<OperationView, Failure> {
        match self.service.as_str() {
            "grpc" => {
                let mut client = FunctionsServiceClient::connect(self.grpc_base.clone()).await?;
                let response = client
                    .get_operation(GetOperationRequest {
                        name: operation_name.to_owned(),
                    })
                    .await?
                    .into_inner();
                Ok(operation_view_from_message(response))
            }
            _ => {
                let id = operation_name.strip_prefix("operations/").unwrap_or(operation_name);
                let url = format!("{}/v1/operations/{}", self.rest_base, id);
                let response = self.http.get(url).send().await?;
                let op = Self::rest_ok(response).await?;
                Ok(operation_view_from_rest(&op))
            }
        }
    }

    // --- Admin-only operations: always REST (see module doc comment). ---

    pub async fn admin_list_workers(&self) -> Result<Vec<Value>, Failure> {
        let url = format!("{}/v1/admin/workers", self.rest_base);
        let response = self.http.get(url).send().await?;
        let body = Self::rest_ok(response).await?;
        Ok(body["workers"].as_array().cloned().unwrap_or_default())
    }

    pub async fn admin_prune(&self) -> Result<(), Failure> {
        let url = format!("{}/v1/admin/prune", self.rest_base);
        let response = self.http.post(url).send().await?;
        Self::rest_ok(response).await.map(|_| ())
    }

    pub async fn admin_reset(&self, project: &str, location: &str, short: &str, keep: bool) -> Result<(), Failure> {
        let url = format!(
            "{}/v1/admin/functions/{}/{}/{}/reset",
            self.rest_base, project, location, short
        );
        let response = self.http.post(url).json(&json!({ "keep": keep })).send().await?;
        Self::rest_ok(response).await.map(|_| ())
    }

    pub async fn admin_debug(&self, project: &str, location: &str, short: &str, port: u16) -> Result<(), Failure> {
        let url = format!(
            "{}/v1/admin/functions/{}/{}/{}/debug",
            self.rest_base, project, location, short
        );
        let response = self.http.post(url).json(&json!({ "port": port })).send().await?;
        Self::rest_ok(response).await.map(|_| ())
    }
}

fn function_message_from_rest_body(body: &Value) -> FunctionMessage {
    let trigger = &body["trigger"];
    let source = &body["source"];
    let trigger_kind = match trigger["kind"].as_str() {
        Some("pubSub") => "pubsub",
        Some("storage") => "storage",
        Some("event") => "event",
        _ => "http",
    };
    FunctionMessage {
        name: body["shortName"].as_str().unwrap_or_default().to_owned(),
        trigger_kind: trigger_kind.to_owned(),
        trigger_resource: trigger["topic"]
            .as_str()
            .or_else(|| trigger["bucket"].as_str())
            .or_else(|| trigger["resource"].as_str())
            .unwrap_or_default()
            .to_owned(),
        trigger_event_type: trigger["eventType"].as_str().unwrap_or_default().to_owned(),
        trigger_service: trigger["service"].as_str().unwrap_or_default().to_owned(),
        source_kind: source["kind"].as_str().unwrap_or("localPath").to_owned(),
        source_location: source["path"]
            .as_str()
            .or_else(|| source["url"].as_str())
            .unwrap_or_default()
            .to_owned(),
        entry_point: body["entryPoint"].as_str().unwrap_or_default().to_owned(),
        timeout_ms: body["timeoutMs"].as_u64().unwrap_or(60_000),
        env: body["env"]
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_owned())))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn function_message_to_json(message: &FunctionMessage) -> Value {
    let trigger = match message.trigger_kind.as_str() {
        "pubsub" => json!({ "kind": "pubSub", "topic": message.trigger_resource }),
        "storage" => json!({ "kind": "storage", "bucket": message.trigger_resource }),
        "event" => json!({
            "kind": "event",
            "eventType": message.trigger_event_type,
            "resource": message.trigger_resource,
            "service": message.trigger_service,
        }),
        _ => json!({ "kind": "http" }),
    };
    let source = match message.source_kind.as_str() {
        "archiveUrl" => json!({ "kind": "archiveUrl", "url": message.source_location }),
        _ => json!({ "kind": "localPath", "path": message.source_location }),
    };
    json!({
        "name": message.name,
        "trigger": trigger,
        "source": source,
        "entry_point": message.entry_point,
        "timeout": message.timeout_ms,
        "env": message.env,
    })
}

fn operation_view_from_rest(op: &Value) -> OperationView {
    let name = op["name"].as_str().unwrap_or_default().to_owned();
    let done = op["done"].as_bool().unwrap_or(false);
    let error = op["outcome"]["error"]["message"].as_str().map(str::to_owned);
    OperationView { name, done, error }
}

fn operation_view_from_message(op: functions_rpc::OperationMessage) -> OperationView {
    OperationView {
        name: op.name.clone(),
        done: op.done,
        error: op.has_error.then_some(op.error_message),
    }
}
