use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to an upstream model provider
///
/// Clients return `anyhow::Result`; callers that need to decide on a retry
/// downcast to this type.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to decode provider payload: {0}")]
    Decode(String),

    #[error("{0} environment variable is required")]
    MissingCredentials(&'static str),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::CONFLICT
            }
            Self::Stream(_) => true,
            Self::Decode(_) | Self::MissingCredentials(_) | Self::NotConfigured(_) => false,
        }
    }

    /// Classify an arbitrary client error
    pub fn is_transient_error(err: &anyhow::Error) -> bool {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<ProviderError>())
            .map(ProviderError::is_transient)
            .unwrap_or(false)
    }
}
