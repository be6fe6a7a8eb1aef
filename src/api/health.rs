use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::controller::AppState;
use crate::domain::{CycleOutcome, Mode};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    controller: ComponentHealth,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ComponentHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cycle_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Healthy once a cycle produced an output that is not `error`
fn controller_health(outcome: Option<&CycleOutcome>) -> ComponentHealth {
    match outcome {
        None => ComponentHealth {
            status: "starting",
            last_cycle_at: None,
            detail: Some("no control cycle has run yet".into()),
        },
        Some(CycleOutcome::Unavailable { timestamp, missing }) => ComponentHealth {
            status: "degraded",
            last_cycle_at: Some(*timestamp),
            detail: Some(format!(
                "missing inputs: {}",
                missing.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
            )),
        },
        Some(CycleOutcome::Ready(output)) if output.mode == Mode::Error => ComponentHealth {
            status: "degraded",
            last_cycle_at: Some(output.diagnostics.timestamp),
            detail: Some(output.decision_reason.clone()),
        },
        Some(CycleOutcome::Ready(output)) => ComponentHealth {
            status: "healthy",
            last_cycle_at: Some(output.diagnostics.timestamp),
            detail: None,
        },
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = state.controller.last_outcome().await;
    let controller = controller_health(outcome.as_ref());
    let healthy = controller.status == "healthy";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        timestamp: Utc::now(),
        controller,
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// GET /health/live
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
