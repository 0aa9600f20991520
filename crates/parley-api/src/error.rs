use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_agent::ChatError;
use parley_client::protocol::ErrorBody;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Chat(e) => {
                let status = match e {
                    ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    ChatError::Unauthorized => StatusCode::FORBIDDEN,
                    ChatError::Validation(_) => StatusCode::BAD_REQUEST,
                    ChatError::NotFound(_) => StatusCode::NOT_FOUND,
                    ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
                    ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::Chat(ChatError::Storage(e)) => {
                tracing::error!("Storage error: {}", e);
                "Storage error".to_string()
            }
            ApiError::Chat(ChatError::Upstream(e)) => {
                tracing::error!("Upstream error: {}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorBody {
            error: message,
            kind: kind.to_string(),
        });

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
