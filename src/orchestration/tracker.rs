//! The Interaction Tracker: every mutation of application and interaction
//! state goes through these operations.

use crate::config::Config;
use crate::db::repo::{OfferOutcome, PurchaseOutcome, SelectionOutcome};
use crate::db::Repository;
use crate::domain::{
    Actor, Application, ApplicationId, BankId, BusinessId, Money, OfferId, TimeMs,
};
use crate::engine::Window;
use crate::notify::{NotificationEvent, NotificationSink};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Clone)]
pub struct InteractionTracker {
    repo: Arc<Repository>,
    notifier: Arc<dyn NotificationSink>,
    config: Config,
}

/// Result of a successful application submission.
#[derive(Debug)]
pub struct SubmittedApplication {
    pub application: Application,
    /// Interaction records fanned out to registered banks.
    pub records_created: usize,
}

/// Result of a successful lead purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub purchased_at: TimeMs,
    pub offer_window: Window,
}

/// Result of a successful offer selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReceipt {
    pub winning_bank: BankId,
    pub commission: Money,
    pub rejected_offers: u64,
}

impl InteractionTracker {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn NotificationSink>, config: Config) -> Self {
        Self {
            repo,
            notifier,
            config,
        }
    }

    /// Create an application with its auction window and fan out one
    /// interaction record per registered bank.
    pub async fn submit_application(
        &self,
        business_id: BusinessId,
        metadata: serde_json::Value,
        now: TimeMs,
    ) -> Result<SubmittedApplication, TrackerError> {
        let application = Application::submit(
            business_id,
            metadata,
            now,
            self.config.auction_window_ms,
            self.config.offer_window_ms,
        );

        let banks = self.repo.list_banks().await?;
        let bank_ids: Vec<BankId> = banks.into_iter().map(|b| b.id).collect();
        let records_created = self
            .repo
            .insert_application_with_fanout(&application, &bank_ids)
            .await?;

        self.dispatch(NotificationEvent::LeadAvailable {
            application_id: application.id.clone(),
            business_id: application.business_id.clone(),
            auction_ends_at: application.auction_ends_at,
        });

        Ok(SubmittedApplication {
            application,
            records_created,
        })
    }

    /// Record a bank's first view of a lead. Returns false on re-views.
    pub async fn mark_viewed(
        &self,
        application_id: &ApplicationId,
        bank_id: &BankId,
        now: TimeMs,
    ) -> Result<bool, TrackerError> {
        let application = self.load_application(application_id).await?;
        self.require_bank(bank_id).await?;
        Ok(self.repo.mark_viewed(&application, bank_id, now).await?)
    }

    /// Unlock a lead for a bank while its auction window is open.
    pub async fn purchase(
        &self,
        application_id: &ApplicationId,
        bank_id: &BankId,
        now: TimeMs,
    ) -> Result<PurchaseReceipt, TrackerError> {
        let application = self.load_application(application_id).await?;
        self.require_bank(bank_id).await?;

        if now >= application.auction_ends_at {
            return Err(TrackerError::AuctionClosed);
        }

        let outcome = self
            .repo
            .purchase_lead(&application, bank_id, now, self.config.lead_price)
            .await?;

        match outcome {
            PurchaseOutcome::AlreadyPurchased => Err(TrackerError::AlreadyPurchased),
            PurchaseOutcome::Purchased { event_key } => {
                // The ledger row committed pending; flip it now that the
                // purchase is durable. A failure leaves it pending and
                // visible, not lost.
                if let Err(e) = self.repo.mark_collection_collected(&event_key).await {
                    warn!(
                        application_id = %application_id,
                        bank_id = %bank_id,
                        error = %e,
                        "Failed to mark purchase fee collected; row stays pending"
                    );
                }

                self.dispatch(NotificationEvent::LeadPurchased {
                    application_id: application.id.clone(),
                    bank_id: bank_id.clone(),
                });

                // The window was fixed when the application was created;
                // re-deriving it from current config could disagree with
                // what the record row says.
                Ok(PurchaseReceipt {
                    purchased_at: now,
                    offer_window: Window::new(
                        application.auction_ends_at,
                        application.selection_ends_at,
                    ),
                })
            }
        }
    }

    /// Record a purchasing bank's financing terms.
    pub async fn submit_offer(
        &self,
        application_id: &ApplicationId,
        bank_id: &BankId,
        amount: Money,
        now: TimeMs,
    ) -> Result<OfferId, TrackerError> {
        let application = self.load_application(application_id).await?;
        self.require_bank(bank_id).await?;

        if now > application.selection_ends_at {
            return Err(TrackerError::OfferWindowClosed);
        }

        let offer_id = OfferId::generate();
        let outcome = self
            .repo
            .submit_offer(
                &application,
                bank_id,
                &offer_id,
                amount,
                now,
                &Actor::System,
            )
            .await?;

        match outcome {
            OfferOutcome::NoPurchase => Err(TrackerError::OfferWithoutPurchase),
            OfferOutcome::AlreadySubmitted => Err(TrackerError::OfferAlreadySubmitted),
            OfferOutcome::Submitted { .. } => {
                self.dispatch(NotificationEvent::OfferSubmitted {
                    application_id: application.id.clone(),
                    bank_id: bank_id.clone(),
                    offer_id: offer_id.clone(),
                });
                Ok(offer_id)
            }
        }
    }

    /// Accept one offer on behalf of the business; all other open offers
    /// are rejected and the commission is booked.
    pub async fn select_offer(
        &self,
        application_id: &ApplicationId,
        offer_id: &OfferId,
        now: TimeMs,
    ) -> Result<SelectionReceipt, TrackerError> {
        let application = self.load_application(application_id).await?;

        if now > application.selection_ends_at {
            return Err(TrackerError::SelectionWindowClosed);
        }

        let outcome = self
            .repo
            .select_offer(
                &application,
                offer_id,
                now,
                self.config.commission_rate,
                &Actor::System,
            )
            .await?;

        match outcome {
            SelectionOutcome::UnknownOffer => Err(TrackerError::UnknownOffer),
            SelectionOutcome::AlreadyResolved => Err(TrackerError::OfferAlreadyResolved),
            SelectionOutcome::Selected {
                bank_id,
                commission,
                rejected_offers,
            } => {
                self.dispatch(NotificationEvent::OfferSelected {
                    application_id: application.id.clone(),
                    bank_id: bank_id.clone(),
                    offer_id: offer_id.clone(),
                });
                Ok(SelectionReceipt {
                    winning_bank: bank_id,
                    commission,
                    rejected_offers,
                })
            }
        }
    }

    async fn load_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, TrackerError> {
        self.repo
            .get_application(application_id)
            .await?
            .ok_or_else(|| TrackerError::UnknownApplication(application_id.clone()))
    }

    async fn require_bank(&self, bank_id: &BankId) -> Result<(), TrackerError> {
        if self.repo.bank_exists(bank_id).await? {
            Ok(())
        } else {
            Err(TrackerError::UnknownBank(bank_id.clone()))
        }
    }

    /// Fire-and-forget dispatch after commit; failures are logged, never
    /// surfaced to the caller.
    fn dispatch(&self, event: NotificationEvent) {
        let sink = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = sink.publish(event).await {
                warn!(error = %e, "Notification delivery failed");
            }
        });
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Application not found: {0}")]
    UnknownApplication(ApplicationId),
    #[error("Bank not registered: {0}")]
    UnknownBank(BankId),
    #[error("Auction window has closed")]
    AuctionClosed,
    #[error("Bank already purchased this lead")]
    AlreadyPurchased,
    #[error("Offer requires a prior lead purchase")]
    OfferWithoutPurchase,
    #[error("Offer window has closed")]
    OfferWindowClosed,
    #[error("Bank already submitted an offer for this application")]
    OfferAlreadySubmitted,
    #[error("No offer with that id on this application")]
    UnknownOffer,
    #[error("Selection window has closed")]
    SelectionWindowClosed,
    #[error("Offer was already accepted or rejected")]
    OfferAlreadyResolved,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
