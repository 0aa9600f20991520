use parley_persist::PersistError;
use thiserror::Error;

/// Errors surfaced to callers of the chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not authorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] PersistError),
}

impl ChatError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream",
            Self::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(ChatError::Unauthenticated.kind(), "unauthenticated");
        assert_eq!(ChatError::validation("x").kind(), "validation");
        let storage: ChatError = PersistError::Internal("boom".into()).into();
        assert_eq!(storage.kind(), "storage");
        assert_eq!(storage.to_string(), "Storage error: Internal error: boom");
    }
}
