//! Error kinds surfaced by the service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or unparseable coordinates in a request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A single-prefix read failed. Callers recover locally by logging
    /// and eliding the prefix.
    #[error("transient store failure: {0}")]
    StoreTransient(String),

    /// Route record persistence failed; surfaces to the caller.
    #[error("store failure: {0}")]
    StoreFatal(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The notification sink rejected or never received an event. The
    /// persisted route update remains the system of record.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Error::StoreTransient(_) | Error::StoreFatal(_) | Error::PublishFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
