use axum::extract::{Path, Query, State};
use axum::Json;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use super::applications::InteractionRecordDto;
use super::{require_non_blank, AppState};
use crate::domain::{BankId, TimeMs};
use crate::engine::derive_status;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBankRequest {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBankResponse {
    /// False when the id was already registered.
    pub created: bool,
}

pub async fn register_bank(
    State(state): State<AppState>,
    Json(request): Json<RegisterBankRequest>,
) -> Result<Json<RegisterBankResponse>, AppError> {
    let id = BankId::new(require_non_blank(&request.id, "id")?);
    let name = require_non_blank(&request.name, "name")?;

    let created = state.repo.register_bank(&id, &name, TimeMs::now()).await?;
    Ok(Json(RegisterBankResponse { created }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDto {
    pub id: String,
    pub name: String,
    pub registered_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankListResponse {
    pub banks: Vec<BankDto>,
}

pub async fn list_banks(State(state): State<AppState>) -> Result<Json<BankListResponse>, AppError> {
    let banks = state
        .repo
        .list_banks()
        .await?
        .into_iter()
        .map(|b| BankDto {
            id: b.id.as_str().to_string(),
            name: b.name,
            registered_at: b.registered_at.as_ms(),
        })
        .collect();

    Ok(Json(BankListResponse { banks }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntryDto {
    /// Calculated status of the application at read time.
    pub application_status: String,
    #[serde(flatten)]
    pub record: InteractionRecordDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTimelineResponse {
    pub bank_id: String,
    pub entries: Vec<TimelineEntryDto>,
}

/// A bank's interaction timeline, each entry annotated with its
/// application's derived status.
pub async fn get_bank_timeline(
    Path(id): Path<String>,
    Query(params): Query<TimelineQuery>,
    State(state): State<AppState>,
) -> Result<Json<BankTimelineResponse>, AppError> {
    let bank_id = BankId::new(require_non_blank(&id, "bankId")?);
    if !state.repo.bank_exists(&bank_id).await? {
        return Err(AppError::NotFound(format!("Bank not found: {}", bank_id)));
    }

    let from = TimeMs::new(params.from_ms.unwrap_or(0));
    let to = TimeMs::new(params.to_ms.unwrap_or(i64::MAX));
    let records = state.repo.records_for_bank(&bank_id, from, to).await?;

    let now = TimeMs::now();
    let entry_futures = records.into_iter().map(|record| {
        let state = state.clone();
        async move {
            let application = state.repo.get_application(&record.application_id).await?;
            let application_status = match application {
                Some(app) => {
                    derive_status(now, Some(app.auction_ends_at), app.offer_count, app.status)
                        .as_str()
                        .to_string()
                }
                // Record without its application: surface the record anyway.
                None => "unknown".to_string(),
            };
            Ok::<TimelineEntryDto, AppError>(TimelineEntryDto {
                application_status,
                record: InteractionRecordDto::from(record),
            })
        }
    });

    let entries = try_join_all(entry_futures).await?;

    Ok(Json(BankTimelineResponse {
        bank_id: bank_id.as_str().to_string(),
        entries,
    }))
}
