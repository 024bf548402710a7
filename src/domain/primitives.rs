//! Domain primitives: TimeMs, ApplicationId, BankId, BusinessId, OfferId, Actor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time in milliseconds.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// This time shifted forward by `ms` milliseconds, saturating on overflow.
    pub fn plus_ms(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }

    /// Render as an RFC 3339 string, or the raw millis when out of chrono's range.
    pub fn to_rfc3339(&self) -> String {
        use chrono::TimeZone;
        match chrono::Utc.timestamp_millis_opt(self.0).single() {
            Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application (lead) identifier. UUIDv4, generated at submission.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn new(id: String) -> Self {
        ApplicationId(id)
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        ApplicationId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bank identifier, supplied by the registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BankId(pub String);

impl BankId {
    pub fn new(id: String) -> Self {
        BankId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Business (lead owner) identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusinessId(pub String);

impl BusinessId {
    pub fn new(id: String) -> Self {
        BusinessId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BusinessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Offer identifier. UUIDv4, generated when a bank submits terms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn new(id: String) -> Self {
        OfferId(id)
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        OfferId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OfferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who triggered a status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Automated transition (reconciler or ingest path).
    System,
    /// Manual transition by an administrator.
    Admin(String),
}

impl Actor {
    /// Stable string form persisted in the audit log.
    pub fn as_audit_str(&self) -> String {
        match self {
            Actor::System => "system".to_string(),
            Actor::Admin(id) => format!("admin:{}", id),
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_audit_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timems_plus_ms() {
        let t = TimeMs::new(1_000);
        assert_eq!(t.plus_ms(500).as_ms(), 1_500);
        assert_eq!(TimeMs::new(i64::MAX).plus_ms(1).as_ms(), i64::MAX);
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }

    #[test]
    fn test_timems_rfc3339_out_of_range_falls_back() {
        let t = TimeMs::new(i64::MAX);
        assert_eq!(t.to_rfc3339(), i64::MAX.to_string());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ApplicationId::generate(), ApplicationId::generate());
        assert_ne!(OfferId::generate(), OfferId::generate());
    }

    #[test]
    fn test_actor_audit_str() {
        assert_eq!(Actor::System.as_audit_str(), "system");
        assert_eq!(
            Actor::Admin("ops-1".to_string()).as_audit_str(),
            "admin:ops-1"
        );
    }
}
