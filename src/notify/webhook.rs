//! Webhook notification sink.

use super::{NotificationEvent, NotificationSink, NotifyError};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Posts every event as JSON to a single collaborator-owned endpoint.
///
/// Transient failures (network, 429, 5xx) are retried with exponential
/// backoff for a bounded interval; client errors are permanent. Delivery
/// is still best-effort overall: the caller drops the error after logging.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a new webhook notifier targeting `url`.
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn publish(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        debug!(?event, url = %self.url, "Publishing notification");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(&event)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(NotifyError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(NotifyError::HttpError {
                    status: status.as_u16(),
                    message: "Rate limited".to_string(),
                }));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(NotifyError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(NotifyError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            Ok(())
        })
        .await
    }
}
