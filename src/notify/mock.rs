//! Recording notification sink for tests.

use super::{NotificationEvent, NotificationSink, NotifyError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every published event; tests assert on the captured sequence.
#[derive(Debug, Default)]
pub struct MockNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `publish` always fails; callers must survive it.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Snapshot of the events published so far.
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn publish(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Other("mock sink failure".to_string()));
        }
        self.events.lock().expect("mock lock poisoned").push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicationId, BankId};

    #[tokio::test]
    async fn test_mock_records_events_in_order() {
        let sink = MockNotifier::new();
        for n in 0..3 {
            sink.publish(NotificationEvent::LeadPurchased {
                application_id: ApplicationId::new(format!("app-{}", n)),
                bank_id: BankId::new("bank-1".to_string()),
            })
            .await
            .unwrap();
        }

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            NotificationEvent::LeadPurchased { application_id, .. }
                if application_id.as_str() == "app-0"
        ));
    }

    #[tokio::test]
    async fn test_failing_mock_errors() {
        let sink = MockNotifier::failing();
        let result = sink
            .publish(NotificationEvent::LeadPurchased {
                application_id: ApplicationId::new("app-1".to_string()),
                bank_id: BankId::new("bank-1".to_string()),
            })
            .await;
        assert!(result.is_err());
        assert!(sink.events().is_empty());
    }
}
