use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::room::RoomError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A room rejected the request.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl ServiceError {
    /// Stable code sent to WebSocket clients in `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable(_) | ServiceError::Degraded => "UNAVAILABLE",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Room(err) => err.code(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Room(err) => match err {
                RoomError::RoomNotFound => AppError::NotFound(err.to_string()),
                RoomError::ArgumentTooLong { .. } | RoomError::NotInRoom => {
                    AppError::BadRequest(err.to_string())
                }
                other => AppError::Conflict(other.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_errors_map_to_http_statuses() {
        let status = |err: RoomError| {
            AppError::from(ServiceError::from(err))
                .into_response()
                .status()
        };
        assert_eq!(status(RoomError::RoomNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(RoomError::RoomFull), StatusCode::CONFLICT);
        assert_eq!(
            status(RoomError::ArgumentTooLong { max: 10 }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn service_errors_expose_wire_codes() {
        assert_eq!(ServiceError::from(RoomError::NotChooser).code(), "NOT_CHOOSER");
        assert_eq!(ServiceError::Degraded.code(), "UNAVAILABLE");
        assert_eq!(
            ServiceError::InvalidInput("bad".into()).code(),
            "INVALID_INPUT"
        );
    }
}
