use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestration::TrackerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// A state-machine constraint rejected the event; no partial write
    /// happened. Retrying without a state change will fail again.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::UnknownApplication(_) | TrackerError::UnknownBank(_) => {
                AppError::NotFound(err.to_string())
            }
            TrackerError::AuctionClosed
            | TrackerError::AlreadyPurchased
            | TrackerError::OfferWithoutPurchase
            | TrackerError::OfferWindowClosed
            | TrackerError::OfferAlreadySubmitted
            | TrackerError::UnknownOffer
            | TrackerError::SelectionWindowClosed
            | TrackerError::OfferAlreadyResolved => AppError::Conflict(err.to_string()),
            TrackerError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApplicationId;

    #[test]
    fn test_tracker_conflicts_map_to_conflict() {
        for err in [
            TrackerError::AuctionClosed,
            TrackerError::AlreadyPurchased,
            TrackerError::OfferWithoutPurchase,
            TrackerError::OfferWindowClosed,
            TrackerError::OfferAlreadySubmitted,
            TrackerError::UnknownOffer,
            TrackerError::SelectionWindowClosed,
            TrackerError::OfferAlreadyResolved,
        ] {
            assert!(matches!(AppError::from(err), AppError::Conflict(_)));
        }
    }

    #[test]
    fn test_unknown_ids_map_to_not_found() {
        let err = TrackerError::UnknownApplication(ApplicationId::new("app-1".to_string()));
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
    }
}
