use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures talking to the platform REST API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session expired")]
    SessionExpired,

    #[error("server returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Reason suitable for showing to the user: the server's own message when
    /// it sent one, else the status text, else a generic line.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Status { status, .. } => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ApiError::Transport(_) | ApiError::Decode(_) => {
                "The booking service could not be reached. Please try again.".to_string()
            }
        }
    }
}

/// The scheduling core's error taxonomy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    /// Detected locally; never sent to the network.
    #[error("{0}")]
    Validation(String),

    #[error("could not check availability: {0}")]
    Availability(String),

    #[error("booking failed: {0}")]
    BookingFailure(String),

    #[error("could not format date value: {0}")]
    Formatting(String),

    #[error("daily limit of {limit} messages reached")]
    QuotaExceeded { limit: u32 },
}

/// Lifecycle actions fail either locally, before any request, or remotely.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Rejected(#[from] SchedulingError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors returned by the chat surface handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Rejected(e) => AppError::Scheduling(e),
            LifecycleError::Api(e) => AppError::Api(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Scheduling(SchedulingError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Scheduling(SchedulingError::QuotaExceeded { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Scheduling(SchedulingError::Formatting(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Scheduling(_) => StatusCode::BAD_GATEWAY,
            AppError::Api(ApiError::SessionExpired) => StatusCode::UNAUTHORIZED,
            AppError::Api(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Api(e) => e.user_message(),
            other => other.to_string(),
        };
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::Status {
            status: reqwest::StatusCode::CONFLICT,
            message: "Slot already taken".to_string(),
        };
        assert_eq!(err.user_message(), "Slot already taken");

        let err = ApiError::Status {
            status: reqwest::StatusCode::CONFLICT,
            message: String::new(),
        };
        assert_eq!(err.user_message(), "Conflict");
    }

    #[test]
    fn test_status_mapping() {
        let res = AppError::Scheduling(SchedulingError::Validation("x".into())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res =
            AppError::Scheduling(SchedulingError::QuotaExceeded { limit: 20 }).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = AppError::Api(ApiError::SessionExpired).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
