use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not logged in")]
    Unauthenticated,
    #[error("missing CSRF token")]
    MissingCsrfToken,
    #[error("invalid CSRF token")]
    InvalidCsrfToken,
    #[error("unknown or already used login state")]
    UnknownState,
    #[error("login verification failed: {0}")]
    Verification(String),
    #[error("session error: {0}")]
    Session(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::MissingCsrfToken | AppError::InvalidCsrfToken => StatusCode::FORBIDDEN,
            AppError::UnknownState | AppError::Verification(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{:?}", self);
            (status, "Something went wrong").into_response()
        } else {
            tracing::debug!("rejected request: {}", self);
            (status, self.to_string()).into_response()
        }
    }
}
