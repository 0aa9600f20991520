use axum::{extract::State, Json};
use std::sync::Arc;

use parley_client::protocol::{SignInRequest, SignInResponse};
use crate::{error::ApiResult, state::AppState};

/// Sign in by name, creating the user and a session
#[utoipa::path(
    post,
    path = "/auth/signin",
    responses(
        (status = 200, description = "Session token for the new user"),
        (status = 400, description = "Missing name")
    ),
    tag = "auth"
)]
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<SignInResponse>> {
    let (user, session) = state.chat.sign_in(&req.name).await?;
    Ok(Json(SignInResponse {
        token: session.token,
        user_id: user.id,
        name: user.name,
    }))
}
