use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed store data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Counter at {0} is not a non-negative integer")]
    NotACounter(String),

    #[error("Transaction on {0} gave up after repeated conflicts")]
    Contention(String),

    #[error("Unsupported store url: {0}")]
    UnsupportedUrl(String),
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion provider responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Completion output did not match the schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Completion refused: {0}")]
    Refusal(String),

    #[error("Completion returned no content")]
    Empty,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("User {0} does not exist")]
    Unauthorized(String),

    #[error("User {user_id} does not own deck {deck_id}")]
    Forbidden { user_id: String, deck_id: u64 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Flashcard generation is not configured")]
    GenerationUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::GenerationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Server { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Completion { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthorized("alice".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden {
                user_id: "bob".into(),
                deck_id: 1
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::NotFound("Deck 9".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Store(StoreError::Contention("deck_counter".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Completion(CompletionError::Empty).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_messages() {
        let error = AppError::Forbidden {
            user_id: "bob".into(),
            deck_id: 4,
        };
        assert_eq!(error.to_string(), "User bob does not own deck 4");
        assert_eq!(
            AppError::NotFound("Deck 9".into()).to_string(),
            "Deck 9 not found"
        );
    }
}
