//! Revenue collection rows and reporting queries.

use crate::domain::{
    ApplicationId, BankId, CollectionStatus, Money, RevenueCollection, RevenueKind, TimeMs,
};
use sqlx::Row;
use tracing::warn;

use super::{parse_money, Repository};

/// Insert a collection row inside an open transaction.
///
/// Idempotent on the deterministic event key, so a retried purchase or
/// selection cannot double-book revenue.
pub(super) async fn insert_collection_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    collection: &RevenueCollection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO revenue_collections (
            event_key, application_id, bank_id, amount, kind, status, recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(event_key) DO NOTHING
        "#,
    )
    .bind(collection.event_key.as_str())
    .bind(collection.application_id.as_str())
    .bind(collection.bank_id.as_str())
    .bind(collection.amount.to_canonical_string())
    .bind(collection.kind.as_str())
    .bind(collection.status.as_str())
    .bind(collection.recorded_at.as_ms())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn map_collection(row: &sqlx::sqlite::SqliteRow) -> RevenueCollection {
    let event_key: String = row.get("event_key");
    let kind_str: String = row.get("kind");
    let kind = RevenueKind::parse(&kind_str).unwrap_or_else(|| {
        warn!(event_key = %event_key, kind = %kind_str, "Unknown revenue kind in row, treating as lead_purchase");
        RevenueKind::LeadPurchase
    });
    let status_str: String = row.get("status");
    let status = CollectionStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(event_key = %event_key, status = %status_str, "Unknown collection status in row, treating as pending");
        CollectionStatus::Pending
    });
    let amount_str: String = row.get("amount");

    RevenueCollection {
        event_key,
        application_id: ApplicationId::new(row.get("application_id")),
        bank_id: BankId::new(row.get("bank_id")),
        amount: parse_money(&amount_str, "amount"),
        kind,
        status,
        recorded_at: TimeMs::new(row.get("recorded_at")),
    }
}

impl Repository {
    /// Move a collection row out of `pending`. Returns false when no row
    /// carries the key.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_collection_status(
        &self,
        event_key: &str,
        status: CollectionStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE revenue_collections SET status = ? WHERE event_key = ?")
            .bind(status.as_str())
            .bind(event_key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip a pending row to `collected`; the purchase path calls this
    /// right after its transaction commits.
    pub async fn mark_collection_collected(&self, event_key: &str) -> Result<bool, sqlx::Error> {
        self.update_collection_status(event_key, CollectionStatus::Collected)
            .await
    }

    /// All collection rows for one application, oldest first.
    pub async fn collections_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<RevenueCollection>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT event_key, application_id, bank_id, amount, kind, status, recorded_at
            FROM revenue_collections
            WHERE application_id = ?
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(application_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_collection).collect())
    }

    /// Collection rows within a time range, oldest first. Reporting
    /// consumers aggregate these in Rust to keep decimal precision; SQLite
    /// SUM would go through floats.
    pub async fn collections_in_range(
        &self,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<RevenueCollection>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT event_key, application_id, bank_id, amount, kind, status, recorded_at
            FROM revenue_collections
            WHERE recorded_at >= ? AND recorded_at <= ?
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(from.as_ms())
        .bind(to.as_ms())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_collection).collect())
    }

    /// Sum of `collected` amounts within a time range.
    pub async fn collected_total(&self, from: TimeMs, to: TimeMs) -> Result<Money, sqlx::Error> {
        let rows = self.collections_in_range(from, to).await?;
        let mut sum = Money::zero();
        for row in rows {
            if row.status == CollectionStatus::Collected {
                sum = sum + row.amount;
            }
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{register_test_banks, setup_repo, test_application};
    use super::super::PurchaseOutcome;
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_mark_collected_and_totals() {
        let (repo, _temp) = setup_repo().await;
        let banks = register_test_banks(&repo, &["b1"]).await;
        let app = test_application(1_000);
        repo.insert_application_with_fanout(&app, &banks)
            .await
            .unwrap();

        let outcome = repo
            .purchase_lead(&app, &banks[0], TimeMs::new(2_000), Money::from_str("250").unwrap())
            .await
            .unwrap();
        let PurchaseOutcome::Purchased { event_key } = outcome else {
            panic!("expected purchase");
        };

        // Pending rows are excluded from collected totals.
        let total = repo
            .collected_total(TimeMs::new(0), TimeMs::new(10_000))
            .await
            .unwrap();
        assert!(total.is_zero());

        assert!(repo.mark_collection_collected(&event_key).await.unwrap());
        let total = repo
            .collected_total(TimeMs::new(0), TimeMs::new(10_000))
            .await
            .unwrap();
        assert_eq!(total, Money::from_str("250").unwrap());

        // Outside the range: nothing.
        let total = repo
            .collected_total(TimeMs::new(5_000), TimeMs::new(10_000))
            .await
            .unwrap();
        assert!(total.is_zero());
    }

    #[tokio::test]
    async fn test_update_unknown_event_key() {
        let (repo, _temp) = setup_repo().await;
        assert!(!repo
            .update_collection_status("rev:missing", CollectionStatus::Failed)
            .await
            .unwrap());
    }
}
