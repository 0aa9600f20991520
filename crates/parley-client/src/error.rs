use thiserror::Error;

use crate::uploads::UploadRejection;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer carrying the server's error body
    #[error("{message} ({status})")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error(transparent)]
    Upload(#[from] UploadRejection),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
