use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// `Database` covers transient persistence failures; `NotFound` covers
/// lookups of rows that do not exist. Internal details go to the log, clients
/// only see generic messages.
#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}
