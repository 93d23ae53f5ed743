//! The loader contract a worker host dispatches one invocation through (§4.3).
//!
//! Two loaders satisfy it: [`crate::mocks::MockLoader`], the default used by local
//! development and this workspace's own test suite, and [`crate::node_host::NodeLoader`],
//! which shells out to a real `node` process. The host (`crate::host`) is identical
//! either way — it only ever talks to the `FunctionLoader` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// What the worker host hands the loader for a single invocation.
#[derive(Debug, Clone)]
pub enum InvocationInput {
    /// HTTP-trigger functions see the request forwarded close to verbatim (§4.3).
    Http {
        method: String,
        path_tail: String,
        query: String,
        body: Value,
    },
    /// Event-trigger (pubsub/storage/generic event) functions see an envelope.
    Event {
        event_id: String,
        timestamp: DateTime<Utc>,
        event_type: String,
        resource: String,
        data: Value,
    },
}

/// What a loader produces for one invocation. The host translates this into the
/// response shape described in §4.3; the loader never talks HTTP itself.
#[derive(Debug, Clone)]
pub enum LoaderOutcome {
    /// The function resolved normally.
    Response(Value),
    /// The function threw synchronously or rejected explicitly.
    Error { message: String, stack: Option<String> },
    /// The function returned without ever calling its completion handle — an "async
    /// crash" (§4.3) distinct from a timeout: the call stack unwound, nothing is still
    /// running, but no response was ever produced.
    NoResponse,
    /// The function is still "running" past any reasonable per-invocation budget; the
    /// host's own timer is expected to win the race against this one.
    Hang,
}

#[async_trait]
pub trait FunctionLoader: Send + Sync {
    async fn invoke(&self, entry_point: &str, input: InvocationInput) -> LoaderOutcome;
}
