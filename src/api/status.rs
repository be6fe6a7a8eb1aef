use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    api::error::ApiError,
    controller::{AppState, ControllerState},
    domain::CycleOutcome,
};

/// GET /api/v1/status - outcome of the most recent cycle
pub async fn get_status(State(state): State<AppState>) -> Result<Json<CycleOutcome>, ApiError> {
    state
        .controller
        .last_outcome()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no control cycle has run yet".into()))
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    state: ControllerState,
    /// Estimator value used when snapshots carry no inertia
    estimated_inertia: f64,
    tick_seconds: u64,
}

/// GET /api/v1/state - state carried between cycles
pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    Json(StateResponse {
        state: state.controller.state().await,
        estimated_inertia: state.controller.inertia().await,
        tick_seconds: state.cfg.controller.tick_seconds,
    })
}
