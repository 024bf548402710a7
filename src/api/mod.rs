pub mod applications;
pub mod banks;
pub mod health;
pub mod offers;
pub mod purchases;
pub mod revenue;
pub mod sweep;

use crate::config::Config;
use crate::db::Repository;
use crate::error::AppError;
use crate::orchestration::{ExpiryReconciler, InteractionTracker};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub tracker: InteractionTracker,
    pub reconciler: ExpiryReconciler,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        tracker: InteractionTracker,
        reconciler: ExpiryReconciler,
    ) -> Self {
        Self {
            repo,
            config,
            tracker,
            reconciler,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/applications", post(applications::submit_application))
        .route("/v1/applications/:id", get(applications::get_application))
        .route(
            "/v1/applications/:id/audit",
            get(applications::get_audit_history),
        )
        .route(
            "/v1/applications/:id/records",
            get(applications::get_interaction_records),
        )
        .route("/v1/applications/:id/views", post(purchases::mark_viewed))
        .route(
            "/v1/applications/:id/purchases",
            post(purchases::purchase_lead),
        )
        .route("/v1/applications/:id/offers", post(offers::submit_offer))
        .route("/v1/applications/:id/selection", post(offers::select_offer))
        .route("/v1/banks", post(banks::register_bank).get(banks::list_banks))
        .route("/v1/banks/:id/interactions", get(banks::get_bank_timeline))
        .route("/v1/revenue/summary", get(revenue::get_summary))
        .route("/v1/revenue/export", get(revenue::export_csv))
        .route("/v1/sweep", post(sweep::run_sweep))
        .layer(cors)
        .with_state(state)
}

/// Reject blank identifiers before touching storage.
pub(crate) fn require_non_blank(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}
