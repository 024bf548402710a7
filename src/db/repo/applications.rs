//! Application rows and terminal-status transitions.

use crate::domain::{
    Actor, Application, ApplicationId, AuctionStatus, AuditEntry, BankId, InteractionStatus, TimeMs,
};

use super::{audit::insert_audit_tx, map_application, Repository};

impl Repository {
    /// Insert a freshly submitted application and fan out one interaction
    /// record per registered bank, atomically.
    ///
    /// Fan-out is idempotent: banks that already have a record for this
    /// application are skipped. Returns the number of records created.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_application_with_fanout(
        &self,
        application: &Application,
        bank_ids: &[BankId],
    ) -> Result<usize, sqlx::Error> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO applications (
                id, business_id, metadata, submitted_at, auction_ends_at,
                selection_ends_at, offer_count, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.id.as_str())
        .bind(application.business_id.as_str())
        .bind(application.metadata.to_string())
        .bind(application.submitted_at.as_ms())
        .bind(application.auction_ends_at.as_ms())
        .bind(application.selection_ends_at.as_ms())
        .bind(application.offer_count as i64)
        .bind(application.status.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let mut fanned_out = 0usize;
        for bank_id in bank_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO interaction_records (
                    application_id, bank_id, business_id, submitted_at,
                    window_starts_at, window_ends_at, status, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(application_id, bank_id) DO NOTHING
                "#,
            )
            .bind(application.id.as_str())
            .bind(bank_id.as_str())
            .bind(application.business_id.as_str())
            .bind(application.submitted_at.as_ms())
            .bind(application.submitted_at.as_ms())
            .bind(application.auction_ends_at.as_ms())
            .bind(InteractionStatus::Submitted.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                fanned_out += 1;
            }
        }

        tx.commit().await?;
        Ok(fanned_out)
    }

    /// Get an application by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, business_id, metadata, submitted_at, auction_ends_at,
                   selection_ends_at, offer_count, status
            FROM applications
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(map_application))
    }

    /// Live auctions whose purchase window has elapsed: the reconciler's
    /// scan set. Bounded and served by the (status, auction_ends_at) index.
    pub async fn expired_live_auctions(
        &self,
        now: TimeMs,
        limit: i64,
    ) -> Result<Vec<Application>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, business_id, metadata, submitted_at, auction_ends_at,
                   selection_ends_at, offer_count, status
            FROM applications
            WHERE status = 'live_auction' AND auction_ends_at <= ?
            ORDER BY auction_ends_at ASC
            LIMIT ?
            "#,
        )
        .bind(now.as_ms())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_application).collect())
    }

    /// Transition an expired live auction to `completed` and open the offer
    /// window on every purchased record.
    ///
    /// The status change is a conditional check-and-set on
    /// `status = 'live_auction'`; a concurrent writer that already moved
    /// the application sees `Ok(false)` and writes nothing. The audit entry
    /// commits in the same transaction as the transition.
    pub async fn complete_expired_application(
        &self,
        application: &Application,
        now: TimeMs,
        actor: &Actor,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE applications SET status = 'completed' WHERE id = ? AND status = 'live_auction'",
        )
        .bind(application.id.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // Purchased records move to offer_received; the window columns were
        // stamped at purchase time, so only backfill if absent.
        sqlx::query(
            r#"
            UPDATE interaction_records
            SET status = ?,
                offer_window_starts_at = COALESCE(offer_window_starts_at, ?),
                offer_window_ends_at = COALESCE(offer_window_ends_at, ?)
            WHERE application_id = ? AND status = ?
            "#,
        )
        .bind(InteractionStatus::OfferReceived.as_str())
        .bind(application.auction_ends_at.as_ms())
        .bind(application.selection_ends_at.as_ms())
        .bind(application.id.as_str())
        .bind(InteractionStatus::Purchased.as_str())
        .execute(&mut *tx)
        .await?;

        let entry = AuditEntry::new(
            application.id.clone(),
            AuctionStatus::LiveAuction,
            AuctionStatus::Completed,
            actor,
            reason,
            now,
        );
        insert_audit_tx(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Transition an expired live auction to `ignored` and mark every
    /// unpurchased record `abandoned`.
    ///
    /// Same check-and-set and audit-coupling contract as
    /// [`Repository::complete_expired_application`].
    pub async fn ignore_expired_application(
        &self,
        application: &Application,
        now: TimeMs,
        actor: &Actor,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query(
            "UPDATE applications SET status = 'ignored' WHERE id = ? AND status = 'live_auction'",
        )
        .bind(application.id.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE interaction_records
            SET status = ?
            WHERE application_id = ? AND purchased_at IS NULL AND status IN (?, ?)
            "#,
        )
        .bind(InteractionStatus::Abandoned.as_str())
        .bind(application.id.as_str())
        .bind(InteractionStatus::Submitted.as_str())
        .bind(InteractionStatus::Available.as_str())
        .execute(&mut *tx)
        .await?;

        let entry = AuditEntry::new(
            application.id.clone(),
            AuctionStatus::LiveAuction,
            AuctionStatus::Ignored,
            actor,
            reason,
            now,
        );
        insert_audit_tx(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(true)
    }

}

#[cfg(test)]
mod tests {
    use super::super::test_support::{register_test_banks, setup_repo, test_application};
    use crate::domain::{Actor, AuctionStatus, InteractionStatus, TimeMs};

    #[tokio::test]
    async fn test_insert_and_get_application() {
        let (repo, _temp) = setup_repo().await;
        let app = test_application(1_000);

        repo.insert_application_with_fanout(&app, &[])
            .await
            .expect("insert failed");

        let loaded = repo
            .get_application(&app.id)
            .await
            .expect("query failed")
            .expect("application missing");
        assert_eq!(loaded, app);
    }

    #[tokio::test]
    async fn test_fanout_creates_one_record_per_bank() {
        let (repo, _temp) = setup_repo().await;
        let banks = register_test_banks(&repo, &["b1", "b2", "b3", "b4", "b5"]).await;
        let app = test_application(1_000);

        let fanned = repo
            .insert_application_with_fanout(&app, &banks)
            .await
            .expect("insert failed");
        assert_eq!(fanned, 5);

        let records = repo
            .records_for_application(&app.id)
            .await
            .expect("query failed");
        assert_eq!(records.len(), 5);
        assert!(records
            .iter()
            .all(|r| r.status == InteractionStatus::Submitted));
    }

    #[tokio::test]
    async fn test_expired_scan_excludes_open_and_terminal() {
        let (repo, _temp) = setup_repo().await;
        let open = test_application(1_000_000);
        let expired = test_application(0);
        repo.insert_application_with_fanout(&open, &[]).await.unwrap();
        repo.insert_application_with_fanout(&expired, &[])
            .await
            .unwrap();

        let now = TimeMs::new(expired.auction_ends_at.as_ms());
        let hits = repo.expired_live_auctions(now, 100).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, expired.id);

        // Once transitioned, the application drops out of the scan set.
        repo.ignore_expired_application(&expired, now, &Actor::System, "test")
            .await
            .unwrap();
        let hits = repo.expired_live_auctions(now, 100).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_transition_is_check_and_set() {
        let (repo, _temp) = setup_repo().await;
        let app = test_application(0);
        repo.insert_application_with_fanout(&app, &[]).await.unwrap();
        let now = TimeMs::new(app.auction_ends_at.as_ms());

        let first = repo
            .ignore_expired_application(&app, now, &Actor::System, "auction expired without offers")
            .await
            .unwrap();
        let second = repo
            .ignore_expired_application(&app, now, &Actor::System, "auction expired without offers")
            .await
            .unwrap();
        assert!(first);
        assert!(!second, "losing writer must observe a no-op");

        let audit = repo.audit_for_application(&app.id).await.unwrap();
        assert_eq!(audit.len(), 1, "no-op transitions must not audit");
        assert_eq!(audit[0].to_status, AuctionStatus::Ignored);
    }
}
