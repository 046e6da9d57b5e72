//! Error types for the Commgate core.

use thiserror::Error;

use crate::rule::RuleType;
use crate::types::{GroupId, RuleId};

/// Errors raised by pure data-model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a rule cannot pair group {0} with itself")]
    SelfPair(GroupId),

    #[error("rule {0} is not a temporary rule")]
    NotTemporary(RuleId),

    #[error("{rule_type} rule violates its shape: {detail}")]
    RuleShape { rule_type: RuleType, detail: String },

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("unknown rule status: {0}")]
    UnknownRuleStatus(String),

    #[error("unknown delivery status: {0}")]
    UnknownDeliveryStatus(String),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),
}
