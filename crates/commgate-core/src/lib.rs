//! # Commgate Core
//!
//! Pure data model for Commgate: groups, principals, communication rules,
//! and message records.
//!
//! This crate contains no I/O, no storage, no async. Every time-dependent
//! question takes an explicit `now` in Unix milliseconds.
//!
//! ## Key Types
//!
//! - [`CommunicationRule`] - A permanent or temporary link between two groups
//! - [`GroupPair`] - Normalized unordered pair of distinct groups
//! - [`RuleStatus`] - Pending / approved / rejected
//! - [`RuleDecision`] - An approval or rejection applied to a temporary rule
//! - [`Principal`] and [`Group`] - Directory entities

pub mod directory;
pub mod error;
pub mod message;
pub mod rule;
pub mod types;
pub mod validation;

pub use directory::{Group, NewPrincipal, Principal, Role};
pub use error::CoreError;
pub use message::{DeliveryStatus, MessageRecord, NewMessage};
pub use rule::{
    expiry_after_hours, CommunicationRule, NewRule, RuleDecision, RuleStatus, RuleType, HOUR_MS,
    REASON_SEPARATOR,
};
pub use types::{GroupId, GroupPair, MessageId, Page, PrincipalId, RuleId};
pub use validation::validate_new_rule;
