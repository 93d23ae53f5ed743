//! `event-types list` (§4.7): a purely local reference table of the trigger/event-type
//! taxonomy this emulator understands, grounded on the well-known event-type strings
//! `functions-rest`/`functions-rpc` already hardcode for their default envelopes
//! (`google.pubsub.topic.publish`, `google.storage.object.finalize`). No daemon
//! round-trip — there's nothing here the daemon could know that this binary doesn't.

use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand)]
pub enum EventTypesAction {
    /// Lists every trigger kind and its well-known event type string(s).
    List,
}

struct EventType {
    trigger: &'static str,
    event_type: &'static str,
    resource_example: &'static str,
}

const EVENT_TYPES: &[EventType] = &[
    EventType {
        trigger: "http",
        event_type: "providers/cloud.functions/eventTypes/http.request",
        resource_example: "-",
    },
    EventType {
        trigger: "pubsub",
        event_type: "google.pubsub.topic.publish",
        resource_example: "projects/{project}/topics/{topic}",
    },
    EventType {
        trigger: "storage",
        event_type: "google.storage.object.finalize",
        resource_example: "projects/_/buckets/{bucket}",
    },
    EventType {
        trigger: "event",
        event_type: "providers/google.firebase.database/eventTypes/ref.write",
        resource_example: "projects/_/instances/{instance}/refs/{ref}",
    },
    EventType {
        trigger: "event",
        event_type: "providers/cloud.firestore/eventTypes/document.write",
        resource_example: "projects/{project}/databases/(default)/documents/{path}",
    },
];

pub fn run(action: EventTypesAction) {
    match action {
        EventTypesAction::List => list(),
    }
}

fn list() {
    let trigger_width = EVENT_TYPES.iter().map(|et| et.trigger.len()).max().unwrap_or(0).max("TRIGGER".len());
    let type_width = EVENT_TYPES.iter().map(|et| et.event_type.len()).max().unwrap_or(0).max("EVENT_TYPE".len());

    println!(
        "{}",
        format!("{:tw$}  {:yw$}  RESOURCE", "TRIGGER", "EVENT_TYPE", tw = trigger_width, yw = type_width).bold()
    );
    for et in EVENT_TYPES {
        println!(
            "{:tw$}  {:yw$}  {}",
            et.trigger,
            et.event_type,
            et.resource_example,
            tw = trigger_width,
            yw = type_width,
        );
    }
}
