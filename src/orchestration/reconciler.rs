//! The Expiry Reconciler: moves applications whose windows have elapsed to
//! their terminal status and keeps interaction records in step.
//!
//! The sweep is idempotent; running it twice in succession writes nothing
//! the second time. Correctness never depends on when it last ran.

use crate::db::Repository;
use crate::domain::{Actor, AuctionStatus, TimeMs};
use crate::engine::derive_status;
use crate::notify::{NotificationEvent, NotificationSink};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Cap on applications handled per sweep; the remainder is picked up by the
/// next run (retry-by-rescan applies to overflow exactly as to failures).
const SWEEP_BATCH_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct ExpiryReconciler {
    repo: Arc<Repository>,
    notifier: Arc<dyn NotificationSink>,
}

/// Counters for one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Applications scanned (expired live auctions).
    pub processed: usize,
    /// Transitions to `completed`.
    pub completed: usize,
    /// Transitions to `ignored`.
    pub ignored: usize,
    /// Unpurchased records marked `abandoned`.
    pub records_abandoned: u64,
    /// Purchased records marked `deal_expired`.
    pub records_expired: u64,
}

impl ExpiryReconciler {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { repo, notifier }
    }

    /// One full sweep at `now`, attributed to `actor` in the audit log.
    ///
    /// Each application transitions in its own transaction; one failure is
    /// logged and skipped, leaving the application eligible for the next
    /// sweep. Storage errors during the scan itself are returned.
    pub async fn run_sweep(&self, now: TimeMs, actor: &Actor) -> Result<SweepSummary, sqlx::Error> {
        let mut summary = SweepSummary::default();

        let expired = self.repo.expired_live_auctions(now, SWEEP_BATCH_LIMIT).await?;
        summary.processed = expired.len();

        for application in &expired {
            let target = derive_status(
                now,
                Some(application.auction_ends_at),
                application.offer_count,
                application.status,
            );

            let result = match target {
                AuctionStatus::Completed => {
                    self.repo
                        .complete_expired_application(
                            application,
                            now,
                            actor,
                            "auction expired with offers",
                        )
                        .await
                }
                AuctionStatus::Ignored => {
                    self.repo
                        .ignore_expired_application(
                            application,
                            now,
                            actor,
                            "auction expired without offers",
                        )
                        .await
                }
                // The scan only returns elapsed auctions; the rule cannot
                // say live for them.
                AuctionStatus::LiveAuction => Ok(false),
            };

            match result {
                Ok(true) => {
                    match target {
                        AuctionStatus::Completed => summary.completed += 1,
                        AuctionStatus::Ignored => summary.ignored += 1,
                        AuctionStatus::LiveAuction => {}
                    }
                    self.dispatch(NotificationEvent::AuctionExpired {
                        application_id: application.id.clone(),
                        status: target,
                    });
                }
                // A concurrent writer already moved it; nothing to do.
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        application_id = %application.id,
                        error = %e,
                        "Sweep step failed; application stays pending for the next run"
                    );
                }
            }
        }

        // Record-granularity pass, decoupled from application status.
        summary.records_abandoned = self.repo.expire_unpurchased_records(now).await?;
        summary.records_expired = self.repo.expire_unresolved_offers(now).await?;

        info!(
            processed = summary.processed,
            completed = summary.completed,
            ignored = summary.ignored,
            records_abandoned = summary.records_abandoned,
            records_expired = summary.records_expired,
            "Expiry sweep finished"
        );

        Ok(summary)
    }

    /// Run the sweep on a fixed interval until the process exits.
    ///
    /// A failed sweep is logged and the loop continues; nothing here is
    /// fatal to the process.
    pub fn spawn_periodic(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep loop");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = self.run_sweep(TimeMs::now(), &Actor::System).await {
                    warn!(error = %e, "Expiry sweep failed; retrying on next interval");
                }
            }
        })
    }

    fn dispatch(&self, event: NotificationEvent) {
        let sink = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = sink.publish(event).await {
                warn!(error = %e, "Notification delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::migrations::init_db;
    use crate::domain::{BankId, BusinessId, InteractionStatus, Money};
    use crate::notify::MockNotifier;
    use crate::orchestration::tracker::InteractionTracker;
    use std::str::FromStr;
    use tempfile::TempDir;

    struct Harness {
        tracker: InteractionTracker,
        reconciler: ExpiryReconciler,
        repo: Arc<Repository>,
        _temp: TempDir,
    }

    async fn setup(bank_ids: &[&str]) -> (Harness, Vec<BankId>) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let notifier = Arc::new(MockNotifier::new());
        let tracker = InteractionTracker::new(
            repo.clone(),
            notifier.clone(),
            Config::for_tests(db_path),
        );
        let reconciler = ExpiryReconciler::new(repo.clone(), notifier);

        let mut banks = Vec::new();
        for id in bank_ids {
            repo.register_bank(&BankId::new(id.to_string()), id, TimeMs::new(0))
                .await
                .unwrap();
            banks.push(BankId::new(id.to_string()));
        }

        (
            Harness {
                tracker,
                reconciler,
                repo,
                _temp: temp_dir,
            },
            banks,
        )
    }

    async fn submit(h: &Harness, at: i64) -> crate::domain::Application {
        h.tracker
            .submit_application(
                BusinessId::new("biz-1".to_string()),
                serde_json::json!({}),
                TimeMs::new(at),
            )
            .await
            .unwrap()
            .application
    }

    #[tokio::test]
    async fn test_no_purchases_transitions_to_ignored() {
        let (h, _banks) = setup(&["b1", "b2"]).await;
        let app = submit(&h, 0).await;

        let now = app.auction_ends_at;
        let summary = h.reconciler.run_sweep(now, &Actor::System).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.records_abandoned, 0, "ignored transition already abandoned them");

        let loaded = h.repo.get_application(&app.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AuctionStatus::Ignored);

        let records = h.repo.records_for_application(&app.id).await.unwrap();
        assert!(records
            .iter()
            .all(|r| r.status == InteractionStatus::Abandoned));

        let audit = h.repo.audit_for_application(&app.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].to_status, AuctionStatus::Ignored);
        assert_eq!(audit[0].reason, "auction expired without offers");
    }

    #[tokio::test]
    async fn test_offers_transition_to_completed_and_open_offer_window() {
        let (h, banks) = setup(&["b1", "b2"]).await;
        let app = submit(&h, 0).await;

        h.tracker
            .purchase(&app.id, &banks[0], TimeMs::new(1_000))
            .await
            .unwrap();
        h.tracker
            .purchase(&app.id, &banks[1], TimeMs::new(1_001))
            .await
            .unwrap();
        h.tracker
            .submit_offer(
                &app.id,
                &banks[0],
                Money::from_str("8000").unwrap(),
                TimeMs::new(2_000),
            )
            .await
            .unwrap();

        let now = app.auction_ends_at;
        let summary = h.reconciler.run_sweep(now, &Actor::System).await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.ignored, 0);

        let loaded = h.repo.get_application(&app.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AuctionStatus::Completed);

        // The offering bank keeps offer_sent; the silent purchaser moves to
        // offer_received with its window open.
        let r0 = h.repo.get_record(&app.id, &banks[0]).await.unwrap().unwrap();
        let r1 = h.repo.get_record(&app.id, &banks[1]).await.unwrap().unwrap();
        assert_eq!(r0.status, InteractionStatus::OfferSent);
        assert_eq!(r1.status, InteractionStatus::OfferReceived);
        assert_eq!(r1.offer_window_ends_at, Some(app.selection_ends_at));

        let audit = h.repo.audit_for_application(&app.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].reason, "auction expired with offers");
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (h, banks) = setup(&["b1", "b2", "b3"]).await;
        let _ignored_app = submit(&h, 0).await;
        let completed_app = submit(&h, 10).await;
        h.tracker
            .purchase(&completed_app.id, &banks[0], TimeMs::new(1_000))
            .await
            .unwrap();
        h.tracker
            .submit_offer(
                &completed_app.id,
                &banks[0],
                Money::from_str("8000").unwrap(),
                TimeMs::new(2_000),
            )
            .await
            .unwrap();

        let now = completed_app.auction_ends_at;
        let first = h.reconciler.run_sweep(now, &Actor::System).await.unwrap();
        assert_eq!(first.processed, 2);
        assert_eq!(first.completed, 1);
        assert_eq!(first.ignored, 1);

        let audit_before = h.repo.audit_count().await.unwrap();
        let second = h.reconciler.run_sweep(now, &Actor::System).await.unwrap();
        assert_eq!(second, SweepSummary::default(), "second run must write nothing");
        assert_eq!(h.repo.audit_count().await.unwrap(), audit_before);
    }

    #[tokio::test]
    async fn test_closure_property_after_sweep() {
        let (h, banks) = setup(&["b1", "b2"]).await;
        let with_offer = submit(&h, 0).await;
        let without_offer = submit(&h, 5).await;
        let still_live = submit(&h, 1_000_000).await;

        h.tracker
            .purchase(&with_offer.id, &banks[0], TimeMs::new(1_000))
            .await
            .unwrap();
        h.tracker
            .submit_offer(
                &with_offer.id,
                &banks[0],
                Money::from_str("8000").unwrap(),
                TimeMs::new(2_000),
            )
            .await
            .unwrap();

        let now = without_offer.auction_ends_at;
        h.reconciler.run_sweep(now, &Actor::System).await.unwrap();

        for id in [&with_offer.id, &without_offer.id, &still_live.id] {
            let app = h.repo.get_application(id).await.unwrap().unwrap();
            assert_eq!(
                app.status,
                derive_status(now, Some(app.auction_ends_at), app.offer_count, app.status),
                "stored status must match the rule after a sweep"
            );
        }
    }

    #[tokio::test]
    async fn test_second_pass_expires_unresolved_offers() {
        let (h, banks) = setup(&["b1"]).await;
        let app = submit(&h, 0).await;
        h.tracker
            .purchase(&app.id, &banks[0], TimeMs::new(1_000))
            .await
            .unwrap();
        h.tracker
            .submit_offer(
                &app.id,
                &banks[0],
                Money::from_str("8000").unwrap(),
                TimeMs::new(2_000),
            )
            .await
            .unwrap();

        // First sweep at auction end: application completes, offer pending.
        h.reconciler
            .run_sweep(app.auction_ends_at, &Actor::System)
            .await
            .unwrap();

        // Second sweep after the offer window: record granular pass flips
        // the unresolved offer to deal_expired.
        let after_selection = app.selection_ends_at.plus_ms(1);
        let summary = h
            .reconciler
            .run_sweep(after_selection, &Actor::System)
            .await
            .unwrap();
        assert_eq!(summary.records_expired, 1);

        let record = h.repo.get_record(&app.id, &banks[0]).await.unwrap().unwrap();
        assert_eq!(record.status, InteractionStatus::DealExpired);
    }

    #[tokio::test]
    async fn test_manual_sweep_attributes_admin_actor() {
        let (h, _banks) = setup(&["b1"]).await;
        let app = submit(&h, 0).await;

        let actor = Actor::Admin("ops-7".to_string());
        h.reconciler
            .run_sweep(app.auction_ends_at, &actor)
            .await
            .unwrap();

        let audit = h.repo.audit_for_application(&app.id).await.unwrap();
        assert_eq!(audit[0].actor, "admin:ops-7");
    }
}
