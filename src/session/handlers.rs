use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{AnalysisPhase, AppView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetViewRequest {
    pub view: AppView,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view: AppView,
    pub analysis: AnalysisPhase,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/view", get(get_view).put(set_view))
}

#[instrument(skip(state))]
pub async fn get_view(State(state): State<AppState>) -> Json<ViewResponse> {
    let view = state.journal.lock().await.view();
    Json(ViewResponse {
        view,
        analysis: state.gate.phase(),
    })
}

#[instrument(skip(state))]
pub async fn set_view(
    State(state): State<AppState>,
    Json(body): Json<SetViewRequest>,
) -> Json<ViewResponse> {
    state.journal.lock().await.set_view(body.view);
    info!(view = ?body.view, "view changed");
    Json(ViewResponse {
        view: body.view,
        analysis: state.gate.phase(),
    })
}
