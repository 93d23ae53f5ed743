//! The mock loader (§4.3 "Function loading"): resolves a function's entry point against
//! a small fixed table of in-process behaviors instead of an external language runtime.
//! This is how the emulator's own fixtures (`helloThrow`, `helloSlow`, `helloNoResponse`,
//! `helloData`, ...) are realised, and what this workspace's supervisor/REST/RPC tests
//! exercise end to end.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::loader::{FunctionLoader, InvocationInput, LoaderOutcome};

pub struct MockLoader;

#[async_trait]
impl FunctionLoader for MockLoader {
    async fn invoke(&self, entry_point: &str, input: InvocationInput) -> LoaderOutcome {
        if entry_point.contains("Throw") {
            return LoaderOutcome::Error {
                message: format!("{} threw synchronously", entry_point),
                stack: Some(format!("at {} (mock:1:1)", entry_point)),
            };
        }

        if entry_point.contains("NoResponse") {
            return LoaderOutcome::NoResponse;
        }

        if entry_point.contains("Slow") {
            // Long enough that the host's own per-invocation timer always wins the
            // race; the host is what actually produces the "timed out" response.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return LoaderOutcome::Response(Value::Null);
        }

        match input {
            InvocationInput::Http {
                method,
                path_tail,
                query,
                body,
            } => LoaderOutcome::Response(json!({
                "method": method,
                "path": path_tail,
                "query": query,
                "body": body,
            })),
            InvocationInput::Event {
                event_id,
                event_type,
                resource,
                data,
                ..
            } => {
                if entry_point.contains("Data") {
                    LoaderOutcome::Response(data)
                } else {
                    LoaderOutcome::Response(json!({
                        "eventId": event_id,
                        "eventType": event_type,
                        "resource": resource,
                        "data": data,
                    }))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hello_echoes_http_method() {
        let outcome = MockLoader
            .invoke(
                "hello",
                InvocationInput::Http {
                    method: "POST".into(),
                    path_tail: String::new(),
                    query: String::new(),
                    body: json!({}),
                },
            )
            .await;
        match outcome {
            LoaderOutcome::Response(v) => assert_eq!(v["method"], "POST"),
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hello_data_echoes_event_payload() {
        let outcome = MockLoader
            .invoke(
                "helloData",
                InvocationInput::Event {
                    event_id: "e1".into(),
                    timestamp: chrono::Utc::now(),
                    event_type: "google.storage.object.finalize".into(),
                    resource: "test".into(),
                    data: json!({"foo": "bar"}),
                },
            )
            .await;
        match outcome {
            LoaderOutcome::Response(v) => assert_eq!(v["foo"], "bar"),
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn hello_throw_produces_an_error_outcome() {
        let outcome = MockLoader
            .invoke(
                "helloThrow",
                InvocationInput::Http {
                    method: "GET".into(),
                    path_tail: String::new(),
                    query: String::new(),
                    body: Value::Null,
                },
            )
            .await;
        assert!(matches!(outcome, LoaderOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn hello_no_response_never_completes_the_invocation() {
        let outcome = MockLoader
            .invoke(
                "helloNoResponse",
                InvocationInput::Http {
                    method: "GET".into(),
                    path_tail: String::new(),
                    query: String::new(),
                    body: Value::Null,
                },
            )
            .await;
        assert!(matches!(outcome, LoaderOutcome::NoResponse));
    }
}
