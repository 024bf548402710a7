use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{require_non_blank, AppState};
use crate::domain::{ApplicationId, BankId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankActionRequest {
    pub bank_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkViewedResponse {
    /// False when the bank had already viewed this lead.
    pub first_view: bool,
}

pub async fn mark_viewed(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<BankActionRequest>,
) -> Result<Json<MarkViewedResponse>, AppError> {
    let application_id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    let bank_id = BankId::new(require_non_blank(&request.bank_id, "bankId")?);

    let first_view = state
        .tracker
        .mark_viewed(&application_id, &bank_id, TimeMs::now())
        .await?;

    Ok(Json(MarkViewedResponse { first_view }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub purchased_at: i64,
    pub offer_window_starts_at: i64,
    pub offer_window_ends_at: i64,
}

pub async fn purchase_lead(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<BankActionRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let application_id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    let bank_id = BankId::new(require_non_blank(&request.bank_id, "bankId")?);

    let receipt = state
        .tracker
        .purchase(&application_id, &bank_id, TimeMs::now())
        .await?;

    Ok(Json(PurchaseResponse {
        purchased_at: receipt.purchased_at.as_ms(),
        offer_window_starts_at: receipt.offer_window.starts_at.as_ms(),
        offer_window_ends_at: receipt.offer_window.ends_at.as_ms(),
    }))
}
