//! Error taxonomy shared by every layer.
//!
//! Each variant maps onto exactly one HTTP status, and the `IntoResponse`
//! impl renders the uniform error envelope `{statusCode, message, errors,
//! success}` so handlers can bubble errors with `?` all the way out.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input, or a business-rule violation
    /// (insufficient stock, undefined status transition).
    #[error("{0}")]
    Invalid(String),

    /// Request DTO failed field validation.
    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),

    /// No authenticated principal on the request.
    #[error("Unauthorized request")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. a second active cart for one user.
    #[error("{0}")]
    Conflict(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Invalid(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Per-field messages for the envelope's `errors` array. Only DTO
    /// validation produces more than the top-level message.
    fn detail(&self) -> Vec<String> {
        match self {
            Error::Validation(errors) => errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| match &e.message {
                        Some(msg) => format!("{field}: {msg}"),
                        None => format!("{field}: invalid value"),
                    })
                })
                .collect(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
    errors: Vec<String>,
    success: bool,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // Clients get an opaque 500; the detail stays in the logs.
            tracing::error!(error = ?self, "request failed");
        }
        let message = if status.is_server_error() {
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            status_code: status.as_u16(),
            message,
            errors: self.detail(),
            success: false,
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::Invalid("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_keeps_message() {
        let err = Error::Invalid("Insufficient stock".into());
        assert_eq!(err.to_string(), "Insufficient stock");
    }
}
