//! The platform's data model (§3): functions, triggers, operations and the worker
//! runtime record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Detail, Error};
use crate::name;

/// The default invocation timeout applied to a [`Function`] that doesn't specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The single trigger a [`Function`] may have (§3: "exactly one trigger kind").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Trigger {
    Http,
    PubSub { topic: String },
    Storage { bucket: String },
    Event {
        event_type: String,
        resource: String,
        service: Option<String>,
    },
}

impl Trigger {
    /// A short tag used for CLI tables and the worker's `--trigger` flag.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Trigger::Http => "http",
            Trigger::PubSub { .. } => "pubsub",
            Trigger::Storage { .. } => "storage",
            Trigger::Event { .. } => "event",
        }
    }

    /// The "resource" column the CLI prints for a deployed function (§4.7).
    pub fn resource(&self) -> Option<&str> {
        match self {
            Trigger::Http => None,
            Trigger::PubSub { topic } => Some(topic),
            Trigger::Storage { bucket } => Some(bucket),
            Trigger::Event { resource, .. } => Some(resource),
        }
    }

    /// Canonicalises the legacy `--trigger-http` / `--trigger-bucket` / `--trigger-topic`
    /// CLI flags into a single [`Trigger`] value (§4.1).
    pub fn from_legacy_flags(
        http: bool,
        bucket: Option<&str>,
        topic: Option<&str>,
        event_type: Option<&str>,
        resource: Option<&str>,
        service: Option<&str>,
    ) -> Result<Trigger, Error> {
        let mut present = 0;
        if http {
            present += 1;
        }
        if bucket.is_some() {
            present += 1;
        }
        if topic.is_some() {
            present += 1;
        }
        if event_type.is_some() || resource.is_some() {
            present += 1;
        }

        match present {
            0 => Err(Error::invalid_argument(
                "exactly one trigger must be specified.",
                vec![Detail::bad_request("trigger", "no trigger flag was provided")],
            )),
            1 => {
                if http {
                    Ok(Trigger::Http)
                } else if let Some(bucket) = bucket {
                    Ok(Trigger::Storage {
                        bucket: bucket.to_owned(),
                    })
                } else if let Some(topic) = topic {
                    Ok(Trigger::PubSub {
                        topic: topic.to_owned(),
                    })
                } else {
                    Ok(Trigger::Event {
                        event_type: event_type.unwrap_or_default().to_owned(),
                        resource: resource.unwrap_or_default().to_owned(),
                        service: service.map(str::to_owned),
                    })
                }
            }
            _ => Err(Error::invalid_argument(
                "exactly one trigger must be specified.",
                vec![Detail::bad_request(
                    "trigger",
                    "more than one trigger flag was provided",
                )],
            )),
        }
    }
}

/// The location a [`Function`] may be sourced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceLocation {
    LocalPath { path: String },
    ArchiveUrl { url: String },
}

/// A deployed function (§3 "Function").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// `projects/{project}/locations/{location}/functions/{short}`.
    pub name: String,
    pub trigger: Trigger,
    pub source: SourceLocation,
    pub entry_point: String,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub env: std::collections::BTreeMap<String, String>,
}

impl Function {
    /// Builds a new function record, defaulting the entry point to the short name and
    /// the timeout to [`DEFAULT_TIMEOUT`], and validating the short name (§4.1).
    pub fn new(
        project: &str,
        location: &str,
        short: &str,
        trigger: Trigger,
        source: SourceLocation,
        entry_point: Option<String>,
        timeout: Option<Duration>,
        env: std::collections::BTreeMap<String, String>,
    ) -> Result<Self, Error> {
        let name = name::format_name(project, location, short)?;
        Ok(Function {
            name,
            trigger,
            source,
            entry_point: entry_point.unwrap_or_else(|| short.to_owned()),
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            env,
        })
    }

    /// The short name, parsed back out of the fully-qualified `name`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// The kind of mutation an [`Operation`] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Delete,
    Update,
}

/// Metadata attached to an in-flight or completed [`Operation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub request: String,
    pub created_at: DateTime<Utc>,
    pub operation_type: OperationType,
}

/// The terminal outcome of an [`Operation`]: exactly one of a response or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationOutcome {
    Response(Option<Function>),
    Error(Error),
}

/// A long-running deploy/delete receipt (§3 "Operation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// `operations/{uuid}`.
    pub name: String,
    pub done: bool,
    pub metadata: OperationMetadata,
    pub outcome: Option<OperationOutcome>,
}

impl Operation {
    pub fn pending(request: impl Into<String>, operation_type: OperationType) -> Self {
        Operation {
            name: name::new_operation_name(),
            done: false,
            metadata: OperationMetadata {
                request: request.into(),
                created_at: Utc::now(),
                operation_type,
            },
            outcome: None,
        }
    }

    /// Completes the operation with a successful outcome. Monotonic: once `done`, this
    /// is a no-op (§3 invariant: "once done=true the object is immutable").
    pub fn complete_with_response(&mut self, response: Option<Function>) {
        if self.done {
            return;
        }
        self.outcome = Some(OperationOutcome::Response(response));
        self.done = true;
    }

    /// Completes the operation with a failure outcome. Monotonic, see
    /// [`Operation::complete_with_response`].
    pub fn complete_with_error(&mut self, error: Error) {
        if self.done {
            return;
        }
        self.outcome = Some(OperationOutcome::Error(error));
        self.done = true;
    }
}

/// The runtime record for a live worker (§3 "Worker"). Owned exclusively by the
/// Supervisor; front-ends only ever see a cloned snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub function_name: String,
    pub pid: u32,
    pub port: u16,
    pub trigger_kind: String,
    pub last_accessed_at: DateTime<Utc>,
    pub debug_port: Option<u16>,
    pub paused: bool,
    pub crashed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_a_function_with_defaults() {
        let f = Function::new(
            "proj",
            "us-central1",
            "hello",
            Trigger::Http,
            SourceLocation::LocalPath {
                path: "./hello".into(),
            },
            None,
            None,
            Default::default(),
        )
        .unwrap();
        assert_eq!(f.entry_point, "hello");
        assert_eq!(f.timeout, DEFAULT_TIMEOUT);
        assert_eq!(f.short_name(), "hello");
    }

    #[test]
    fn it_canonicalises_legacy_trigger_flags() {
        let t = Trigger::from_legacy_flags(false, Some("my-bucket"), None, None, None, None)
            .unwrap();
        assert_eq!(t, Trigger::Storage { bucket: "my-bucket".into() });
    }

    #[test]
    fn it_rejects_zero_or_multiple_trigger_flags() {
        assert!(Trigger::from_legacy_flags(false, None, None, None, None, None).is_err());
        assert!(Trigger::from_legacy_flags(true, Some("b"), None, None, None, None).is_err());
    }

    #[test]
    fn operation_completion_is_monotonic() {
        let mut op = Operation::pending("deploy hello", OperationType::Create);
        assert!(!op.done);
        op.complete_with_response(None);
        assert!(op.done);
        // A second completion attempt must not flip the outcome.
        op.complete_with_error(Error::internal("too late"));
        match op.outcome {
            Some(OperationOutcome::Response(_)) => {}
            _ => panic!("completed operation must not transition away from its first outcome"),
        }
    }

    #[test]
    fn function_serializes_timeout_as_millis() {
        let f = Function::new(
            "proj",
            "us-central1",
            "hello",
            Trigger::Http,
            SourceLocation::LocalPath { path: ".".into() },
            None,
            Some(Duration::from_secs(2)),
            Default::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["timeout"], 2000);
    }
}
