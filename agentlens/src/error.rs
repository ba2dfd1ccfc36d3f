//! Typed errors for the session store and the query API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} already exists")]
    AlreadyExists(String),

    #[error("invalid {column} value in database: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Errors surfaced by HTTP handlers as `{ "error": ... }` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("internal error")]
    Internal(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(err) => {
                tracing::error!(error = %err, "query failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
