//! Rule validation: shape checks applied before a rule is stored.

use crate::error::CoreError;
use crate::rule::{NewRule, RuleStatus, RuleType};

fn shape(rule_type: RuleType, detail: &str) -> CoreError {
    CoreError::RuleShape {
        rule_type,
        detail: detail.to_string(),
    }
}

/// Validate the shape of a rule about to be inserted.
///
/// This checks:
/// - The two groups differ
/// - Permanent rules carry no expiry, no requester, no user scoping, and are approved
/// - Temporary rules have a requester, start pending and undecided
/// - User scoping matches the presence of a target principal
/// - Any expiry lies after the creation time
pub fn validate_new_rule(rule: &NewRule) -> Result<(), CoreError> {
    // 1. No self pairs
    rule.pair()?;

    match rule.rule_type {
        // 2. Permanent shape
        RuleType::Permanent => {
            if rule.user_specific || rule.target_principal_id.is_some() {
                return Err(shape(rule.rule_type, "cannot be user-specific"));
            }
            if rule.expires_at.is_some() {
                return Err(shape(rule.rule_type, "cannot expire"));
            }
            if rule.requester_id.is_some() {
                return Err(shape(rule.rule_type, "has no requester"));
            }
            if rule.status != RuleStatus::Approved || rule.decided_by.is_none() {
                return Err(shape(rule.rule_type, "must be approved on creation"));
            }
        }

        // 3. Temporary shape
        RuleType::Temporary => {
            if rule.requester_id.is_none() {
                return Err(shape(rule.rule_type, "requires a requester"));
            }
            if rule.status != RuleStatus::Pending || rule.decided_by.is_some() {
                return Err(shape(rule.rule_type, "must start pending and undecided"));
            }
            if rule.user_specific != rule.target_principal_id.is_some() {
                return Err(shape(
                    rule.rule_type,
                    "user scoping requires exactly one target principal",
                ));
            }
            if let Some(expiry) = rule.expires_at {
                if expiry <= rule.created_at {
                    return Err(CoreError::InvalidExpiry(format!(
                        "expiry {} is not after creation {}",
                        expiry, rule.created_at
                    )));
                }
            }
        }
    }

    Ok(())
}
