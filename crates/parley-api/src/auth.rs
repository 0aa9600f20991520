use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use parley_agent::Caller;

use crate::{error::ApiError, state::AppState};

/// Caller resolved from the `Authorization: Bearer` header
///
/// Missing or unknown tokens yield an anonymous caller; the service decides
/// which operations need a user.
pub struct Auth(pub Caller);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let caller = state.chat.authenticate(token).await?;
        Ok(Auth(caller))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
