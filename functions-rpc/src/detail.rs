//! Maps the shared `(kind, detail[])` taxonomy (§4.8) onto a [`tonic::Status`], attaching
//! the structured detail payloads as a trailing `detail-bin` metadata entry the way the
//! real cloud RPC surface does.

use tonic::metadata::MetadataValue;
use tonic::Status;

use functions_core::Error;

const DETAIL_BIN_KEY: &str = "detail-bin";

/// Converts a platform [`Error`] into a [`Status`] carrying the same `(code, message)`
/// plus a `detail-bin` trailer with the JSON-encoded detail list (§4.6: "a list of
/// base64-encoded typed detail payloads" — the `-bin` metadata-key suffix is what
/// triggers gRPC's own base64 transport encoding; the payload here is the detail list
/// itself).
pub fn error_to_status(error: &Error) -> Status {
    let mut status = Status::new(
        tonic::Code::from_i32(error.kind.rpc_code()),
        error.message.clone(),
    );
    if !error.details.is_empty() {
        if let Ok(bytes) = serde_json::to_vec(&error.details) {
            let value = MetadataValue::from_bytes(&bytes);
            status.metadata_mut().insert_bin(DETAIL_BIN_KEY, value);
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use functions_core::{Detail, ErrorKind};

    #[test]
    fn invalid_argument_maps_to_rpc_code_3_with_details_attached() {
        let error = Error::invalid_argument(
            "Invalid value 'x': bad name.",
            vec![Detail::bad_request("name", "must match the pattern")],
        );
        let status = error_to_status(&error);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(error.kind.rpc_code(), 3);
        assert!(status.metadata().get_bin(DETAIL_BIN_KEY).is_some());
    }

    #[test]
    fn errors_without_details_carry_no_trailer() {
        let error = Error::new(ErrorKind::NotFound, "missing", Vec::new());
        let status = error_to_status(&error);
        assert!(status.metadata().get_bin(DETAIL_BIN_KEY).is_none());
    }
}
