//! Shared data model, name validation, error taxonomy, and persisted-state primitives
//! for the functions emulator.
//!
//! This crate has no async runtime dependency and no knowledge of HTTP, gRPC, or
//! child processes — every other crate in the workspace (registry, supervisor, the two
//! front-ends, the worker host, and the CLI) depends on it for the vocabulary they all
//! need to agree on.

pub mod active_server;
pub mod config;
pub mod error;
pub mod model;
pub mod name;
pub mod ports;
pub mod store;

pub use error::{Detail, Error, ErrorKind, FieldViolation};
pub use model::{
    Function, Operation, OperationMetadata, OperationOutcome, OperationType, SourceLocation,
    Trigger, WorkerRecord, DEFAULT_TIMEOUT,
};
pub use ports::{FunctionLookup, WorkerProvisioner};
