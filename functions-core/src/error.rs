//! The shared `(kind, detail[])` error taxonomy used by every front-end (§4.8, §7).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The platform-level error kind. Each variant carries its own REST status and RPC code,
/// see [`ErrorKind::rest_status`] / [`ErrorKind::rpc_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Internal,
}

impl ErrorKind {
    /// The `status` string used in REST error bodies (`{error:{status: "..."}}`).
    pub fn status_name(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// The HTTP status code a REST front-end should reply with.
    pub fn rest_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// The gRPC status code an RPC front-end should reply with.
    pub fn rpc_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => 3,
            ErrorKind::NotFound => 5,
            ErrorKind::AlreadyExists => 6,
            ErrorKind::Internal => 13,
        }
    }
}

/// A single field violation, used by the `BadRequest` detail payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub description: String,
}

/// One of the structured detail payloads a caller can attach to an [`Error`] (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Detail {
    BadRequest { violations: Vec<FieldViolation> },
    DebugInfo { stack_entries: Vec<String>, detail: String },
    ResourceInfo {
        resource_type: String,
        resource_name: String,
        description: String,
    },
}

impl Detail {
    pub fn bad_request(field: impl Into<String>, description: impl Into<String>) -> Self {
        Detail::BadRequest {
            violations: vec![FieldViolation {
                field: field.into(),
                description: description.into(),
            }],
        }
    }

    pub fn resource_info(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Detail::ResourceInfo {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            description: description.into(),
        }
    }

    pub fn debug_info(detail: impl Into<String>) -> Self {
        Detail::DebugInfo {
            stack_entries: Vec::new(),
            detail: detail.into(),
        }
    }
}

/// The error type returned by every fallible public operation in this crate family.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Vec<Detail>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>, details: Vec<Detail>) -> Self {
        Error {
            kind,
            message: message.into(),
            details,
        }
    }

    pub fn invalid_argument(message: impl Into<String>, details: Vec<Detail>) -> Self {
        Error::new(ErrorKind::InvalidArgument, message, details)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, message, Vec::new())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::AlreadyExists, message, Vec::new())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, message, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_kinds_to_rest_and_rpc_codes() {
        assert_eq!(ErrorKind::InvalidArgument.rest_status(), 400);
        assert_eq!(ErrorKind::InvalidArgument.rpc_code(), 3);
        assert_eq!(ErrorKind::NotFound.rest_status(), 404);
        assert_eq!(ErrorKind::AlreadyExists.rest_status(), 409);
        assert_eq!(ErrorKind::Internal.rest_status(), 500);
        assert_eq!(ErrorKind::Internal.rpc_code(), 13);
    }

    #[test]
    fn it_round_trips_through_json() {
        let err = Error::invalid_argument(
            "Invalid value 'x': bad name.",
            vec![Detail::bad_request("name", "must match the pattern")],
        );
        let json = serde_json::to_string(&err).unwrap();
        let back: Error = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ErrorKind::InvalidArgument);
        assert_eq!(back.message, err.message);
    }
}
