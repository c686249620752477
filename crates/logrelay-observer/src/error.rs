//! Error types for the observer API.
//!
//! [`ObserverError`] converts into a JSON HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logrelay_types::UnknownSeverity;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// Missing or wrong bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// A message was submitted with a severity the relay cannot route.
    #[error(transparent)]
    InvalidSeverity(#[from] UnknownSeverity),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidSeverity(_) => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
