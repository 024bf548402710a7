use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{require_non_blank, AppState};
use crate::domain::{
    Application, ApplicationId, BusinessId, InteractionRecord, TimeMs,
};
use crate::engine::{derive_status, is_urgent};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationRequest {
    pub business_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationResponse {
    pub application_id: String,
    pub auction_ends_at: i64,
    pub selection_ends_at: i64,
    pub records_created: usize,
}

pub async fn submit_application(
    State(state): State<AppState>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<Json<SubmitApplicationResponse>, AppError> {
    let business_id = require_non_blank(&request.business_id, "businessId")?;
    if !request.metadata.is_object() && !request.metadata.is_null() {
        return Err(AppError::BadRequest(
            "metadata must be a JSON object".to_string(),
        ));
    }
    let metadata = if request.metadata.is_null() {
        serde_json::json!({})
    } else {
        request.metadata
    };

    let submitted = state
        .tracker
        .submit_application(BusinessId::new(business_id), metadata, TimeMs::now())
        .await?;

    Ok(Json(SubmitApplicationResponse {
        application_id: submitted.application.id.as_str().to_string(),
        auction_ends_at: submitted.application.auction_ends_at.as_ms(),
        selection_ends_at: submitted.application.selection_ends_at.as_ms(),
        records_created: submitted.records_created,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProjection {
    pub id: String,
    pub business_id: String,
    /// Status from the derivation rule at read time, not the stored cache.
    pub status: String,
    pub submitted_at: i64,
    pub auction_ends_at: i64,
    pub selection_ends_at: i64,
    pub offer_count: u32,
    /// Within one hour of the governing deadline.
    pub urgent: bool,
    pub purchased_by: Vec<String>,
    pub viewed_by: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Project an application with its calculated status and derived bank sets.
fn project(application: &Application, records: &[InteractionRecord], now: TimeMs) -> ApplicationProjection {
    let status = derive_status(
        now,
        Some(application.auction_ends_at),
        application.offer_count,
        application.status,
    );

    // The governing deadline: auction end while purchasing is open, then
    // the selection deadline until it passes.
    let deadline = if now < application.auction_ends_at {
        application.auction_ends_at
    } else {
        application.selection_ends_at
    };

    let purchased_by = records
        .iter()
        .filter(|r| r.is_purchased())
        .map(|r| r.bank_id.as_str().to_string())
        .collect();
    let viewed_by = records
        .iter()
        .filter(|r| r.viewed_at.is_some())
        .map(|r| r.bank_id.as_str().to_string())
        .collect();

    ApplicationProjection {
        id: application.id.as_str().to_string(),
        business_id: application.business_id.as_str().to_string(),
        status: status.as_str().to_string(),
        submitted_at: application.submitted_at.as_ms(),
        auction_ends_at: application.auction_ends_at.as_ms(),
        selection_ends_at: application.selection_ends_at.as_ms(),
        offer_count: application.offer_count,
        urgent: is_urgent(now, deadline),
        purchased_by,
        viewed_by,
        metadata: application.metadata.clone(),
    }
}

pub async fn get_application(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApplicationProjection>, AppError> {
    let id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    let application = state
        .repo
        .get_application(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application not found: {}", id)))?;
    let records = state.repo.records_for_application(&id).await?;

    Ok(Json(project(&application, &records, TimeMs::now())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryDto {
    pub from_status: String,
    pub to_status: String,
    pub actor: String,
    pub reason: String,
    pub recorded_at: i64,
    pub recorded_at_iso: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditHistoryResponse {
    pub application_id: String,
    pub entries: Vec<AuditEntryDto>,
}

pub async fn get_audit_history(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AuditHistoryResponse>, AppError> {
    let id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    if state.repo.get_application(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Application not found: {}", id)));
    }

    let entries = state
        .repo
        .audit_for_application(&id)
        .await?
        .into_iter()
        .map(|e| AuditEntryDto {
            from_status: e.from_status.as_str().to_string(),
            to_status: e.to_status.as_str().to_string(),
            actor: e.actor,
            reason: e.reason,
            recorded_at: e.recorded_at.as_ms(),
            recorded_at_iso: e.recorded_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(AuditHistoryResponse {
        application_id: id.as_str().to_string(),
        entries,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecordDto {
    pub application_id: String,
    pub bank_id: String,
    pub business_id: String,
    pub status: String,
    pub submitted_at: i64,
    pub window_starts_at: i64,
    pub window_ends_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_window_starts_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_window_ends_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_sent_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_accepted_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_rejected_at: Option<i64>,
}

impl From<InteractionRecord> for InteractionRecordDto {
    fn from(r: InteractionRecord) -> Self {
        InteractionRecordDto {
            application_id: r.application_id.as_str().to_string(),
            bank_id: r.bank_id.as_str().to_string(),
            business_id: r.business_id.as_str().to_string(),
            status: r.status.as_str().to_string(),
            submitted_at: r.submitted_at.as_ms(),
            window_starts_at: r.window_starts_at.as_ms(),
            window_ends_at: r.window_ends_at.as_ms(),
            viewed_at: r.viewed_at.map(|t| t.as_ms()),
            purchased_at: r.purchased_at.map(|t| t.as_ms()),
            offer_window_starts_at: r.offer_window_starts_at.map(|t| t.as_ms()),
            offer_window_ends_at: r.offer_window_ends_at.map(|t| t.as_ms()),
            offer_id: r.offer_id.map(|o| o.as_str().to_string()),
            offer_amount: r.offer_amount.map(|m| m.to_canonical_string()),
            offer_sent_at: r.offer_sent_at.map(|t| t.as_ms()),
            offer_accepted_at: r.offer_accepted_at.map(|t| t.as_ms()),
            offer_rejected_at: r.offer_rejected_at.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    pub application_id: String,
    pub records: Vec<InteractionRecordDto>,
}

pub async fn get_interaction_records(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RecordsResponse>, AppError> {
    let id = ApplicationId::new(require_non_blank(&id, "applicationId")?);
    if state.repo.get_application(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Application not found: {}", id)));
    }

    let records = state
        .repo
        .records_for_application(&id)
        .await?
        .into_iter()
        .map(InteractionRecordDto::from)
        .collect();

    Ok(Json(RecordsResponse {
        application_id: id.as_str().to_string(),
        records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BankId, InteractionStatus};
    use crate::engine::windows::{AUCTION_WINDOW_MS, OFFER_WINDOW_MS};

    fn test_app(submitted_at: i64) -> Application {
        Application::submit(
            BusinessId::new("biz-1".to_string()),
            serde_json::json!({}),
            TimeMs::new(submitted_at),
            AUCTION_WINDOW_MS,
            OFFER_WINDOW_MS,
        )
    }

    fn record_for(app: &Application, bank: &str) -> InteractionRecord {
        InteractionRecord::fanned_out(
            app.id.clone(),
            BankId::new(bank.to_string()),
            app.business_id.clone(),
            app.submitted_at,
            app.auction_ends_at,
        )
    }

    #[test]
    fn test_projection_uses_derived_status_not_cache() {
        let app = test_app(0);
        // Stored status still live_auction, but the window has elapsed with
        // no offers: the projection must say ignored.
        let projection = project(&app, &[], app.auction_ends_at.plus_ms(1));
        assert_eq!(projection.status, "ignored");
    }

    #[test]
    fn test_projection_urgency_near_auction_end() {
        let app = test_app(0);
        let half_hour_before = TimeMs::new(AUCTION_WINDOW_MS - 30 * 60 * 1000);
        let projection = project(&app, &[], half_hour_before);
        assert!(projection.urgent);

        let early = TimeMs::new(1_000);
        let projection = project(&app, &[], early);
        assert!(!projection.urgent);
    }

    #[test]
    fn test_projection_derives_bank_sets() {
        let app = test_app(0);
        let mut viewed = record_for(&app, "b1");
        viewed.viewed_at = Some(TimeMs::new(500));
        viewed.status = InteractionStatus::Available;
        let mut purchased = record_for(&app, "b2");
        purchased.viewed_at = Some(TimeMs::new(600));
        purchased.purchased_at = Some(TimeMs::new(700));
        purchased.status = InteractionStatus::Purchased;
        let untouched = record_for(&app, "b3");

        let projection = project(&app, &[viewed, purchased, untouched], TimeMs::new(1_000));
        assert_eq!(projection.purchased_by, vec!["b2"]);
        assert_eq!(projection.viewed_by, vec!["b1", "b2"]);
    }
}
