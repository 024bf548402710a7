use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{require_non_blank, AppState};
use crate::domain::{ApplicationId, BankId, Money, OfferId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferRequest {
    pub bank_id: String,
    /// Financing amount as a decimal string to keep it lossless.
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferResponse {
    pub offer_id: String,
}

pub async fn submit_offer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SubmitOfferRequest>,
) -> Result<Json<SubmitOfferResponse>, AppError> {
    let application_id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    let bank_id = BankId::new(require_non_blank(&request.bank_id, "bankId")?);

    let amount = Money::from_str(request.amount.trim())
        .map_err(|_| AppError::BadRequest("amount must be a valid decimal".to_string()))?;
    if !amount.is_positive() {
        return Err(AppError::BadRequest("amount must be positive".to_string()));
    }

    let offer_id = state
        .tracker
        .submit_offer(&application_id, &bank_id, amount, TimeMs::now())
        .await?;

    Ok(Json(SubmitOfferResponse {
        offer_id: offer_id.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOfferRequest {
    pub offer_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOfferResponse {
    pub winning_bank_id: String,
    pub commission: String,
    pub rejected_offers: u64,
}

pub async fn select_offer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SelectOfferRequest>,
) -> Result<Json<SelectOfferResponse>, AppError> {
    let application_id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    let offer_id = OfferId::new(require_non_blank(&request.offer_id, "offerId")?);

    let receipt = state
        .tracker
        .select_offer(&application_id, &offer_id, TimeMs::now())
        .await?;

    Ok(Json(SelectOfferResponse {
        winning_bank_id: receipt.winning_bank.as_str().to_string(),
        commission: receipt.commission.to_canonical_string(),
        rejected_offers: receipt.rejected_offers,
    }))
}
