use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AppState;
use crate::domain::{CollectionStatus, Money, RevenueCollection, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindSummaryDto {
    pub kind: String,
    pub collected: String,
    pub pending: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSummaryDto {
    pub bank_id: String,
    pub collected: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummaryResponse {
    pub from_ms: i64,
    pub to_ms: i64,
    pub total_collected: String,
    pub by_kind: Vec<KindSummaryDto>,
    pub by_bank: Vec<BankSummaryDto>,
}

fn parse_range(params: &RevenueQuery) -> Result<(TimeMs, TimeMs), AppError> {
    let from = TimeMs::new(params.from_ms.unwrap_or(0));
    let to = TimeMs::new(params.to_ms.unwrap_or(i64::MAX));
    if from > to {
        return Err(AppError::BadRequest(
            "fromMs must not exceed toMs".to_string(),
        ));
    }
    Ok((from, to))
}

/// Aggregation happens here in Rust rather than in SQL so the amounts stay
/// in decimal arithmetic end to end.
fn summarize(rows: &[RevenueCollection], from: TimeMs, to: TimeMs) -> RevenueSummaryResponse {
    let mut total_collected = Money::zero();
    let mut by_kind: BTreeMap<&str, (Money, Money, usize)> = BTreeMap::new();
    let mut by_bank: BTreeMap<String, (Money, usize)> = BTreeMap::new();

    for row in rows {
        let kind_entry = by_kind
            .entry(row.kind.as_str())
            .or_insert((Money::zero(), Money::zero(), 0));
        kind_entry.2 += 1;

        match row.status {
            CollectionStatus::Collected => {
                total_collected = total_collected + row.amount;
                kind_entry.0 = kind_entry.0 + row.amount;

                let bank_entry = by_bank
                    .entry(row.bank_id.as_str().to_string())
                    .or_insert((Money::zero(), 0));
                bank_entry.0 = bank_entry.0 + row.amount;
                bank_entry.1 += 1;
            }
            CollectionStatus::Pending => {
                kind_entry.1 = kind_entry.1 + row.amount;
            }
            CollectionStatus::Failed | CollectionStatus::Refunded => {}
        }
    }

    RevenueSummaryResponse {
        from_ms: from.as_ms(),
        to_ms: to.as_ms(),
        total_collected: total_collected.to_canonical_string(),
        by_kind: by_kind
            .into_iter()
            .map(|(kind, (collected, pending, rows))| KindSummaryDto {
                kind: kind.to_string(),
                collected: collected.to_canonical_string(),
                pending: pending.to_canonical_string(),
                rows,
            })
            .collect(),
        by_bank: by_bank
            .into_iter()
            .map(|(bank_id, (collected, rows))| BankSummaryDto {
                bank_id,
                collected: collected.to_canonical_string(),
                rows,
            })
            .collect(),
    }
}

pub async fn get_summary(
    Query(params): Query<RevenueQuery>,
    State(state): State<AppState>,
) -> Result<Json<RevenueSummaryResponse>, AppError> {
    let (from, to) = parse_range(&params)?;
    let rows = state.repo.collections_in_range(from, to).await?;
    Ok(Json(summarize(&rows, from, to)))
}

/// CSV export of collection rows for reporting collaborators.
pub async fn export_csv(
    Query(params): Query<RevenueQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = parse_range(&params)?;
    let rows = state.repo.collections_in_range(from, to).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "event_key",
            "application_id",
            "bank_id",
            "kind",
            "status",
            "amount",
            "recorded_at",
            "recorded_at_iso",
        ])
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;

    for row in &rows {
        let amount = row.amount.to_canonical_string();
        let recorded_at = row.recorded_at.as_ms().to_string();
        let recorded_at_iso = row.recorded_at.to_rfc3339();
        writer
            .write_record([
                row.event_key.as_str(),
                row.application_id.as_str(),
                row.bank_id.as_str(),
                row.kind.as_str(),
                row.status.as_str(),
                amount.as_str(),
                recorded_at.as_str(),
                recorded_at_iso.as_str(),
            ])
            .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    let body = String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("CSV encoding failed: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicationId, BankId, RevenueKind};
    use std::str::FromStr;

    fn row(bank: &str, kind: RevenueKind, status: CollectionStatus, amount: &str) -> RevenueCollection {
        let mut collection = RevenueCollection::pending(
            kind,
            ApplicationId::new("app-1".to_string()),
            BankId::new(bank.to_string()),
            Money::from_str(amount).unwrap(),
            TimeMs::new(1_000),
        );
        collection.status = status;
        collection
    }

    #[test]
    fn test_summarize_groups_and_sums() {
        let rows = vec![
            row("b1", RevenueKind::LeadPurchase, CollectionStatus::Collected, "250"),
            row("b2", RevenueKind::LeadPurchase, CollectionStatus::Collected, "250"),
            row("b1", RevenueKind::Commission, CollectionStatus::Pending, "400"),
            row("b2", RevenueKind::Commission, CollectionStatus::Refunded, "99"),
        ];

        let summary = summarize(&rows, TimeMs::new(0), TimeMs::new(10_000));
        assert_eq!(summary.total_collected, "500");

        let purchase = summary
            .by_kind
            .iter()
            .find(|k| k.kind == "lead_purchase")
            .unwrap();
        assert_eq!(purchase.collected, "500");
        assert_eq!(purchase.rows, 2);

        let commission = summary
            .by_kind
            .iter()
            .find(|k| k.kind == "commission")
            .unwrap();
        assert_eq!(commission.collected, "0");
        assert_eq!(commission.pending, "400");

        assert_eq!(summary.by_bank.len(), 2);
        let b1 = summary.by_bank.iter().find(|b| b.bank_id == "b1").unwrap();
        assert_eq!(b1.collected, "250");
    }

    #[test]
    fn test_parse_range_rejects_inverted() {
        let params = RevenueQuery {
            from_ms: Some(10),
            to_ms: Some(5),
        };
        assert!(parse_range(&params).is_err());
    }
}
