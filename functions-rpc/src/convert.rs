//! Mechanical conversions between `functions_core::model` and the wire messages
//! generated from `proto/functions.proto`.

use std::collections::BTreeMap;
use std::time::Duration;

use functions_core::model::{Function, Operation, OperationOutcome, OperationType, SourceLocation};
use functions_core::{name, Error, Trigger};

use crate::{FunctionMessage, OperationMessage};

pub fn function_to_message(function: &Function) -> FunctionMessage {
    let (trigger_kind, trigger_resource, trigger_event_type, trigger_service) =
        match &function.trigger {
            Trigger::Http => ("http".to_owned(), String::new(), String::new(), String::new()),
            Trigger::PubSub { topic } => ("pubsub".to_owned(), topic.clone(), String::new(), String::new()),
            Trigger::Storage { bucket } => {
                ("storage".to_owned(), bucket.clone(), String::new(), String::new())
            }
            Trigger::Event { event_type, resource, service } => (
                "event".to_owned(),
                resource.clone(),
                event_type.clone(),
                service.clone().unwrap_or_default(),
            ),
        };
    let (source_kind, source_location) = match &function.source {
        SourceLocation::LocalPath { path } => ("localPath".to_owned(), path.clone()),
        SourceLocation::ArchiveUrl { url } => ("archiveUrl".to_owned(), url.clone()),
    };

    FunctionMessage {
        name: function.name.clone(),
        trigger_kind,
        trigger_resource,
        trigger_event_type,
        trigger_service,
        source_kind,
        source_location,
        entry_point: function.entry_point.clone(),
        timeout_ms: function.timeout.as_millis() as u64,
        env: function.env.clone().into_iter().collect(),
    }
}

pub fn message_to_function(
    project: &str,
    location: &str,
    msg: &FunctionMessage,
) -> Result<Function, Error> {
    let short = name::parse_name(&msg.name)
        .map(|parsed| parsed.short)
        .unwrap_or_else(|_| msg.name.rsplit('/').next().unwrap_or(&msg.name).to_owned());

    let trigger = match msg.trigger_kind.as_str() {
        "pubsub" => Trigger::PubSub { topic: msg.trigger_resource.clone() },
        "storage" => Trigger::Storage { bucket: msg.trigger_resource.clone() },
        "event" => Trigger::Event {
            event_type: msg.trigger_event_type.clone(),
            resource: msg.trigger_resource.clone(),
            service: (!msg.trigger_service.is_empty()).then(|| msg.trigger_service.clone()),
        },
        _ => Trigger::Http,
    };
    let source = if msg.source_kind == "archiveUrl" {
        SourceLocation::ArchiveUrl { url: msg.source_location.clone() }
    } else {
        SourceLocation::LocalPath { path: msg.source_location.clone() }
    };
    let entry_point = (!msg.entry_point.is_empty()).then(|| msg.entry_point.clone());
    let timeout = (msg.timeout_ms > 0).then(|| Duration::from_millis(msg.timeout_ms));
    let env: BTreeMap<String, String> = msg.env.clone().into_iter().collect();

    Function::new(project, location, &short, trigger, source, entry_point, timeout, env)
}

pub fn operation_to_message(op: &Operation) -> OperationMessage {
    let operation_type = match op.metadata.operation_type {
        OperationType::Create => "create",
        OperationType::Delete => "delete",
        OperationType::Update => "update",
    }
    .to_owned();

    let mut message = OperationMessage {
        name: op.name.clone(),
        done: op.done,
        operation_type,
        request: op.metadata.request.clone(),
        created_at: op.metadata.created_at.to_rfc3339(),
        response_function: None,
        has_response_function: false,
        error_kind: String::new(),
        error_message: String::new(),
        has_error: false,
    };

    match &op.outcome {
        Some(OperationOutcome::Response(Some(f))) => {
            message.response_function = Some(function_to_message(f));
            message.has_response_function = true;
        }
        Some(OperationOutcome::Response(None)) => {}
        Some(OperationOutcome::Error(e)) => {
            message.error_kind = e.kind.status_name().to_owned();
            message.error_message = e.message.clone();
            message.has_error = true;
        }
        None => {}
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use functions_core::model::DEFAULT_TIMEOUT;

    #[test]
    fn round_trips_an_http_function_through_the_wire_message() {
        let function = Function::new(
            "proj",
            "us-central1",
            "hello",
            Trigger::Http,
            SourceLocation::LocalPath { path: "./fixture".into() },
            None,
            None,
            Default::default(),
        )
        .unwrap();

        let message = function_to_message(&function);
        assert_eq!(message.trigger_kind, "http");
        assert_eq!(message.timeout_ms, DEFAULT_TIMEOUT.as_millis() as u64);

        let back = message_to_function("proj", "us-central1", &message).unwrap();
        assert_eq!(back.name, function.name);
        assert_eq!(back.trigger, Trigger::Http);
    }

    #[test]
    fn round_trips_an_event_function_through_the_wire_message() {
        let function = Function::new(
            "proj",
            "us-central1",
            "helloData",
            Trigger::Event {
                event_type: "google.storage.object.finalize".into(),
                resource: "test".into(),
                service: None,
            },
            SourceLocation::LocalPath { path: ".".into() },
            None,
            None,
            Default::default(),
        )
        .unwrap();

        let message = function_to_message(&function);
        let back = message_to_function("proj", "us-central1", &message).unwrap();
        assert_eq!(back.trigger, function.trigger);
    }
}
