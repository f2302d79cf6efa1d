use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Returned to the modem on any persistence failure; the cause stays in the logs.
pub const PERSISTENCE_FAILURE_MESSAGE: &str = "Error processing data";

/// Missing or unusable configuration. Only raised while the service starts.
#[derive(Debug, Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// Request-time failures, each mapped to a status code and JSON body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid sensor data: {0}")]
    Validation(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(_) | AppError::MalformedRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Persistence(ref e) => {
                tracing::error!(error = %e, "failed to persist sensor reading");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PERSISTENCE_FAILURE_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("temperature".into()), StatusCode::BAD_REQUEST),
            (AppError::MalformedRequest("eof".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Persistence(StoreError::Auth("token expired".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError("missing FIREBASE_PRIVATE_KEY".into());
        assert_eq!(err.to_string(), "Configuration error: missing FIREBASE_PRIVATE_KEY");
    }
}
