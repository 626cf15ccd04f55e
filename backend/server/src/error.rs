use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::ErrorCode;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not enough stock for {name}. Only {available} left.")]
    InsufficientStock { name: String, available: i64 },

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Database is temporarily busy. Please try again in a moment.")]
    Busy,

    #[error("Database error: {0}")]
    Store(rusqlite::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::InsufficientStock { .. }
            | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => AppError::Busy,
            _ => AppError::Store(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store details stay in the log, clients get a generic message.
        let message = if status.is_server_error() {
            error!("{self}");
            if matches!(self, AppError::Busy) {
                self.to_string()
            } else {
                "An unexpected error occurred.".to_string()
            }
        } else {
            warn!(status = status.as_u16(), "{self}");
            self.to_string()
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MalformedPayload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientStock {
                name: "Auric Veil".into(),
                available: 2
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::Unauthorized("Please log in.".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_stock_message() {
        let err = AppError::InsufficientStock {
            name: "Vintage Heart".into(),
            available: 0,
        };

        assert_eq!(err.to_string(), "Not enough stock for Vintage Heart. Only 0 left.");
    }

    #[test]
    fn test_busy_database_maps_to_busy() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );

        assert!(matches!(AppError::from(busy), AppError::Busy));
        assert!(matches!(
            AppError::from(rusqlite::Error::QueryReturnedNoRows),
            AppError::Store(_)
        ));
    }
}
