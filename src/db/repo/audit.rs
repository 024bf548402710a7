//! Append-only audit log operations. There is no update or delete path.

use crate::domain::{ApplicationId, AuctionStatus, AuditEntry, TimeMs};
use sqlx::Row;
use tracing::warn;

use super::Repository;

/// Insert an audit entry inside an open transaction.
///
/// Status transitions call this before committing so that the transition
/// and its trail commit or roll back together.
pub(super) async fn insert_audit_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &AuditEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (
            application_id, from_status, to_status, actor, reason, recorded_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.application_id.as_str())
    .bind(entry.from_status.as_str())
    .bind(entry.to_status.as_str())
    .bind(entry.actor.as_str())
    .bind(entry.reason.as_str())
    .bind(entry.recorded_at.as_ms())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn map_audit_entry(row: &sqlx::sqlite::SqliteRow) -> AuditEntry {
    let application_id: String = row.get("application_id");
    let from_str: String = row.get("from_status");
    let to_str: String = row.get("to_status");
    let parse = |s: &str| {
        AuctionStatus::parse(s).unwrap_or_else(|| {
            warn!(application_id = %application_id, status = %s, "Unknown status in audit row, treating as ignored");
            AuctionStatus::Ignored
        })
    };

    AuditEntry {
        application_id: ApplicationId::new(application_id.clone()),
        from_status: parse(&from_str),
        to_status: parse(&to_str),
        actor: row.get("actor"),
        reason: row.get("reason"),
        recorded_at: TimeMs::new(row.get("recorded_at")),
    }
}

impl Repository {
    /// Full transition history for one application, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn audit_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT application_id, from_status, to_status, actor, reason, recorded_at
            FROM audit_log
            WHERE application_id = ?
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(application_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_audit_entry).collect())
    }

    /// Audit entries within a time range, for operational reporting.
    pub async fn audit_in_range(
        &self,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT application_id, from_status, to_status, actor, reason, recorded_at
            FROM audit_log
            WHERE recorded_at >= ? AND recorded_at <= ?
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(from.as_ms())
        .bind(to.as_ms())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_audit_entry).collect())
    }

    /// Total number of audit entries. Sweeps are asserted idempotent by
    /// comparing this count before and after a re-run.
    pub async fn audit_count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_log")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{setup_repo, test_application};
    use crate::domain::{Actor, TimeMs};

    #[tokio::test]
    async fn test_audit_history_ordering_and_range() {
        let (repo, _temp) = setup_repo().await;
        let app = test_application(0);
        repo.insert_application_with_fanout(&app, &[]).await.unwrap();

        let t1 = TimeMs::new(app.auction_ends_at.as_ms());
        repo.ignore_expired_application(&app, t1, &Actor::System, "auction expired without offers")
            .await
            .unwrap();

        let history = repo.audit_for_application(&app.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor, "system");
        assert_eq!(history[0].reason, "auction expired without offers");

        let in_range = repo.audit_in_range(t1, t1).await.unwrap();
        assert_eq!(in_range.len(), 1);
        let out_of_range = repo
            .audit_in_range(TimeMs::new(0), TimeMs::new(t1.as_ms() - 1))
            .await
            .unwrap();
        assert!(out_of_range.is_empty());
    }
}
