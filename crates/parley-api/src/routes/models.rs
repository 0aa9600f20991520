use axum::{extract::State, Json};
use std::sync::Arc;

use parley_agent::ModelInfo;
use parley_client::protocol::ModelList;
use crate::state::AppState;

/// Models whose provider is configured, for the model picker
#[utoipa::path(
    get,
    path = "/models",
    responses(
        (status = 200, description = "Available models and the default")
    ),
    tag = "models"
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let default_model = state.chat.default_model();
    let models = state
        .chat
        .registry()
        .available_models()
        .into_iter()
        .map(|id| ModelInfo::new(id, default_model))
        .collect();

    Json(ModelList {
        models,
        default_model: default_model.to_string(),
    })
}
