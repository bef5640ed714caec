//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::TransitionError;
use ledger_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Fulfillment engine error.
    Transition(TransitionError),
    /// Store error outside a transition.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Transition(err) => transition_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn transition_error_to_response(err: TransitionError) -> (StatusCode, String) {
    match &err {
        TransitionError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        TransitionError::IllegalTransition { .. } | TransitionError::DeletionRejected(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        TransitionError::EmptyScope => (StatusCode::BAD_REQUEST, err.to_string()),
        TransitionError::Persistence(store_err) => {
            store_status(store_err, err.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    let message = err.to_string();
    store_status(&err, message)
}

fn store_status(err: &StoreError, message: String) -> (StatusCode, String) {
    match err {
        StoreError::Conflict { .. } | StoreError::Duplicate { .. } => {
            (StatusCode::CONFLICT, message)
        }
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, message),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, message),
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::Transition(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
