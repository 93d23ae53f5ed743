//! Converts the shared `(kind, detail[])` taxonomy (§4.8) into the REST error body
//! shape `{error:{code,status,message,errors[]}}`.

use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde_json::json;

use functions_core::Error;

/// A thin wrapper so `?` works against [`functions_core::Error`] inside handlers while
/// keeping the REST-specific `IntoResponse` impl out of `functions-core` (which knows
/// nothing about HTTP).
pub struct RestError(pub Error);

impl From<Error> for RestError {
    fn from(e: Error) -> Self {
        RestError(e)
    }
}

pub fn into_response(RestError(error): RestError) -> Response {
    let status = StatusCode::from_u16(error.kind.rest_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let errors: Vec<serde_json::Value> = error
        .details
        .iter()
        .map(|d| serde_json::to_value(d).expect("detail serialises"))
        .collect();
    let body = json!({
        "error": {
            "code": status.as_u16(),
            "status": error.kind.status_name(),
            "message": error.message,
            "errors": errors,
        }
    });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use functions_core::ErrorKind;

    #[tokio::test]
    async fn not_found_maps_to_404_with_status_name() {
        let error = Error::not_found("Function 'x' does not exist.");
        let response = into_response(RestError(error));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["status"], "NOT_FOUND");
    }

    #[test]
    fn every_kind_maps_to_a_distinct_status() {
        assert_eq!(ErrorKind::InvalidArgument.rest_status(), 400);
        assert_eq!(ErrorKind::AlreadyExists.rest_status(), 409);
    }
}
