use crate::error::{ChatError, Result};

/// Identity attached to an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(String),
}

impl Caller {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User(user_id.into())
    }

    /// The caller's user id, or `Unauthenticated`
    pub fn require(&self) -> Result<&str> {
        match self {
            Caller::User(id) => Ok(id),
            Caller::Anonymous => Err(ChatError::Unauthenticated),
        }
    }
}

impl From<Option<String>> for Caller {
    fn from(user_id: Option<String>) -> Self {
        user_id.map_or(Caller::Anonymous, Caller::User)
    }
}
