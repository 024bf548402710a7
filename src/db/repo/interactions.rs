//! Interaction records: the per (application, bank) timeline, and the
//! transactional ingest operations that mutate it.
//!
//! Updates are always scoped by the (application_id, bank_id) composite key
//! so concurrent purchases by different banks never clobber each other.

use crate::domain::{
    Application, ApplicationId, AuctionStatus, AuditEntry, Actor, BankId, InteractionRecord,
    InteractionStatus, Money, OfferId, RevenueCollection, RevenueKind, TimeMs,
};
use crate::engine::derive_status;
use sqlx::Row;

use super::audit::insert_audit_tx;
use super::revenue::insert_collection_tx;
use super::{map_interaction_record, OfferOutcome, PurchaseOutcome, Repository, SelectionOutcome};

/// Create the pair's record if fan-out never did (bank registered after the
/// application was submitted). No-op when the record exists.
async fn ensure_record_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    application: &Application,
    bank_id: &BankId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
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
    .bind(chrono::Utc::now().timestamp_millis())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

impl Repository {
    /// Get the interaction record for one (application, bank) pair.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_record(
        &self,
        application_id: &ApplicationId,
        bank_id: &BankId,
    ) -> Result<Option<InteractionRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM interaction_records WHERE application_id = ? AND bank_id = ?",
        )
        .bind(application_id.as_str())
        .bind(bank_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(map_interaction_record))
    }

    /// All records for an application, stable order by bank id.
    pub async fn records_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<InteractionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM interaction_records WHERE application_id = ? ORDER BY bank_id ASC",
        )
        .bind(application_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_interaction_record).collect())
    }

    /// One bank's timeline within a time range, newest submission first.
    pub async fn records_for_bank(
        &self,
        bank_id: &BankId,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<InteractionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM interaction_records
            WHERE bank_id = ? AND submitted_at >= ? AND submitted_at <= ?
            ORDER BY submitted_at DESC, application_id ASC
            "#,
        )
        .bind(bank_id.as_str())
        .bind(from.as_ms())
        .bind(to.as_ms())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_interaction_record).collect())
    }

    /// Record a bank's first view of a lead. Re-views are no-ops; the first
    /// view flips a `submitted` record to `available`.
    pub async fn mark_viewed(
        &self,
        application: &Application,
        bank_id: &BankId,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        ensure_record_tx(&mut tx, application, bank_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE interaction_records
            SET viewed_at = ?,
                status = CASE WHEN status = ? THEN ? ELSE status END
            WHERE application_id = ? AND bank_id = ? AND viewed_at IS NULL
            "#,
        )
        .bind(now.as_ms())
        .bind(InteractionStatus::Submitted.as_str())
        .bind(InteractionStatus::Available.as_str())
        .bind(application.id.as_str())
        .bind(bank_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unlock a lead for a bank: stamp `purchased_at`, open the offer
    /// window, and insert the flat-fee ledger row in one transaction.
    ///
    /// The caller has already verified the auction window is open. The
    /// conditional update on `purchased_at IS NULL` makes the purchase
    /// first-writer-wins; the loser gets `AlreadyPurchased` and nothing is
    /// written.
    pub async fn purchase_lead(
        &self,
        application: &Application,
        bank_id: &BankId,
        now: TimeMs,
        fee: Money,
    ) -> Result<PurchaseOutcome, sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        ensure_record_tx(&mut tx, application, bank_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE interaction_records
            SET purchased_at = ?,
                offer_window_starts_at = ?,
                offer_window_ends_at = ?,
                status = ?
            WHERE application_id = ? AND bank_id = ? AND purchased_at IS NULL
            "#,
        )
        .bind(now.as_ms())
        .bind(application.auction_ends_at.as_ms())
        .bind(application.selection_ends_at.as_ms())
        .bind(InteractionStatus::Purchased.as_str())
        .bind(application.id.as_str())
        .bind(bank_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(PurchaseOutcome::AlreadyPurchased);
        }

        let collection = RevenueCollection::pending(
            RevenueKind::LeadPurchase,
            application.id.clone(),
            bank_id.clone(),
            fee,
            now,
        );
        insert_collection_tx(&mut tx, &collection).await?;

        tx.commit().await?;
        Ok(PurchaseOutcome::Purchased {
            event_key: collection.event_key,
        })
    }

    /// Record a bank's financing offer and bump the application's offer
    /// count in one transaction, with at most one offer per pair.
    ///
    /// The conditional update on `offer_id IS NULL` is what guarantees the
    /// offer count increments exactly once per distinct offer under
    /// concurrent retries. When the auction has already closed, the stored
    /// status cache is repaired through the status rule in the same
    /// transaction (with its audit entry).
    pub async fn submit_offer(
        &self,
        application: &Application,
        bank_id: &BankId,
        offer_id: &OfferId,
        amount: Money,
        now: TimeMs,
        actor: &Actor,
    ) -> Result<OfferOutcome, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE interaction_records
            SET offer_id = ?, offer_amount = ?, offer_sent_at = ?, status = ?
            WHERE application_id = ? AND bank_id = ?
              AND purchased_at IS NOT NULL AND offer_id IS NULL
            "#,
        )
        .bind(offer_id.as_str())
        .bind(amount.to_canonical_string())
        .bind(now.as_ms())
        .bind(InteractionStatus::OfferSent.as_str())
        .bind(application.id.as_str())
        .bind(bank_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let row = sqlx::query(
                "SELECT * FROM interaction_records WHERE application_id = ? AND bank_id = ?",
            )
            .bind(application.id.as_str())
            .bind(bank_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            tx.rollback().await?;
            let outcome = match row.as_ref().map(map_interaction_record) {
                Some(record) if record.is_purchased() => OfferOutcome::AlreadySubmitted,
                _ => OfferOutcome::NoPurchase,
            };
            return Ok(outcome);
        }

        sqlx::query("UPDATE applications SET offer_count = offer_count + 1 WHERE id = ?")
            .bind(application.id.as_str())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT offer_count, status FROM applications WHERE id = ?")
            .bind(application.id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let offer_count: i64 = row.get("offer_count");
        let stored_str: String = row.get("status");
        let stored = AuctionStatus::parse(&stored_str).unwrap_or(AuctionStatus::LiveAuction);

        // An offer landing after auction close (inside the offer window)
        // makes the cached status stale; repair it through the one rule.
        let target = derive_status(
            now,
            Some(application.auction_ends_at),
            offer_count.max(0) as u32,
            stored,
        );
        if target != stored {
            let updated = sqlx::query("UPDATE applications SET status = ? WHERE id = ? AND status = ?")
                .bind(target.as_str())
                .bind(application.id.as_str())
                .bind(stored.as_str())
                .execute(&mut *tx)
                .await?;
            if updated.rows_affected() > 0 {
                let entry = AuditEntry::new(
                    application.id.clone(),
                    stored,
                    target,
                    actor,
                    "offer submitted after auction close",
                    now,
                );
                insert_audit_tx(&mut tx, &entry).await?;
            }
        }

        tx.commit().await?;
        Ok(OfferOutcome::Submitted {
            offer_count: offer_count.max(0) as u32,
        })
    }

    /// Accept one offer and reject every other open offer on the
    /// application; stamp the stored status `completed` and insert the
    /// commission ledger row, all in one transaction.
    ///
    /// `offer_accepted_at` and `offer_rejected_at` stay mutually exclusive
    /// because both updates require the record to be unresolved.
    pub async fn select_offer(
        &self,
        application: &Application,
        offer_id: &OfferId,
        now: TimeMs,
        commission_rate: Money,
        actor: &Actor,
    ) -> Result<SelectionOutcome, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            "SELECT * FROM interaction_records WHERE application_id = ? AND offer_id = ?",
        )
        .bind(application.id.as_str())
        .bind(offer_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(winner) = row.as_ref().map(map_interaction_record) else {
            tx.rollback().await?;
            return Ok(SelectionOutcome::UnknownOffer);
        };
        if winner.offer_resolved() {
            tx.rollback().await?;
            return Ok(SelectionOutcome::AlreadyResolved);
        }

        let accepted = sqlx::query(
            r#"
            UPDATE interaction_records
            SET offer_accepted_at = ?, status = ?
            WHERE application_id = ? AND offer_id = ?
              AND offer_accepted_at IS NULL AND offer_rejected_at IS NULL
            "#,
        )
        .bind(now.as_ms())
        .bind(InteractionStatus::Accepted.as_str())
        .bind(application.id.as_str())
        .bind(offer_id.as_str())
        .execute(&mut *tx)
        .await?;

        if accepted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SelectionOutcome::AlreadyResolved);
        }

        let rejected = sqlx::query(
            r#"
            UPDATE interaction_records
            SET offer_rejected_at = ?, status = ?
            WHERE application_id = ? AND offer_id IS NOT NULL AND offer_id != ?
              AND offer_accepted_at IS NULL AND offer_rejected_at IS NULL
            "#,
        )
        .bind(now.as_ms())
        .bind(InteractionStatus::Rejected.as_str())
        .bind(application.id.as_str())
        .bind(offer_id.as_str())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT status FROM applications WHERE id = ?")
            .bind(application.id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let stored_str: String = row.get("status");
        let stored = AuctionStatus::parse(&stored_str).unwrap_or(AuctionStatus::LiveAuction);

        if stored != AuctionStatus::Completed {
            let updated = sqlx::query("UPDATE applications SET status = ? WHERE id = ? AND status = ?")
                .bind(AuctionStatus::Completed.as_str())
                .bind(application.id.as_str())
                .bind(stored.as_str())
                .execute(&mut *tx)
                .await?;
            if updated.rows_affected() > 0 {
                let entry = AuditEntry::new(
                    application.id.clone(),
                    stored,
                    AuctionStatus::Completed,
                    actor,
                    "offer selected",
                    now,
                );
                insert_audit_tx(&mut tx, &entry).await?;
            }
        }

        let deal_value = winner.offer_amount.unwrap_or_else(Money::zero);
        let commission = deal_value.commission_at(commission_rate);
        let collection = RevenueCollection::pending(
            RevenueKind::Commission,
            application.id.clone(),
            winner.bank_id.clone(),
            commission,
            now,
        );
        insert_collection_tx(&mut tx, &collection).await?;

        tx.commit().await?;
        Ok(SelectionOutcome::Selected {
            bank_id: winner.bank_id,
            commission,
            rejected_offers: rejected.rows_affected(),
        })
    }

    /// Record-granularity expiry: unpurchased records whose application
    /// window has elapsed become `abandoned`. Idempotent.
    pub async fn expire_unpurchased_records(&self, now: TimeMs) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE interaction_records
            SET status = ?
            WHERE status IN (?, ?) AND purchased_at IS NULL AND window_ends_at <= ?
            "#,
        )
        .bind(InteractionStatus::Abandoned.as_str())
        .bind(InteractionStatus::Submitted.as_str())
        .bind(InteractionStatus::Available.as_str())
        .bind(now.as_ms())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Record-granularity expiry: purchased records whose offer window has
    /// elapsed without acceptance or rejection become `deal_expired`.
    /// Idempotent; terminal records are never touched.
    pub async fn expire_unresolved_offers(&self, now: TimeMs) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE interaction_records
            SET status = ?
            WHERE status IN (?, ?, ?)
              AND purchased_at IS NOT NULL
              AND offer_window_ends_at IS NOT NULL AND offer_window_ends_at <= ?
              AND offer_accepted_at IS NULL AND offer_rejected_at IS NULL
            "#,
        )
        .bind(InteractionStatus::DealExpired.as_str())
        .bind(InteractionStatus::Purchased.as_str())
        .bind(InteractionStatus::OfferReceived.as_str())
        .bind(InteractionStatus::OfferSent.as_str())
        .bind(now.as_ms())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
