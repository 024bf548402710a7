//! Domain types for the lead auction broker.
//!
//! This module provides:
//! - Lossless monetary amounts via the Money wrapper
//! - Domain primitives: TimeMs, ApplicationId, BankId, BusinessId, OfferId
//! - The Application, InteractionRecord, RevenueCollection, and AuditEntry
//!   aggregates with their status enums

pub mod application;
pub mod audit;
pub mod interaction;
pub mod money;
pub mod primitives;
pub mod revenue;

pub use application::{Application, AuctionStatus};
pub use audit::AuditEntry;
pub use interaction::{InteractionRecord, InteractionStatus};
pub use money::Money;
pub use primitives::{Actor, ApplicationId, BankId, BusinessId, OfferId, TimeMs};
pub use revenue::{CollectionStatus, RevenueCollection, RevenueKind};
