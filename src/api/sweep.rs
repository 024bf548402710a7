use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::{Actor, TimeMs};
use crate::error::AppError;
use crate::orchestration::SweepSummary;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSweepRequest {
    /// Identifies the administrator for manual runs; audit entries carry
    /// `admin:<id>` instead of the `system` sentinel.
    #[serde(default)]
    pub actor_id: Option<String>,
}

/// On-demand expiry sweep; the same code path the timer runs.
pub async fn run_sweep(
    State(state): State<AppState>,
    request: Option<Json<RunSweepRequest>>,
) -> Result<Json<SweepSummary>, AppError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let actor = match request.actor_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Actor::Admin(id.to_string()),
        _ => Actor::System,
    };

    let summary = state.reconciler.run_sweep(TimeMs::now(), &actor).await?;
    Ok(Json(summary))
}
