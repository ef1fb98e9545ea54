use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("an account with this email already exists")]
    DuplicateAccount,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("too many attempts, try again later")]
    RateLimited,

    #[error("please verify your email before logging in")]
    UnverifiedEmail,

    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateAccount => "duplicate_account",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::RateLimited => "rate_limited",
            AppError::UnverifiedEmail => "unverified_email",
            AppError::RemoteUnavailable(_) => "remote_unavailable",
            AppError::Database(_) => "database",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateAccount => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::UnverifiedEmail => StatusCode::FORBIDDEN,
            AppError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}
