//! Sender/receiver permission evaluation.
//!
//! The decision is a pure function of the two principals, the rules stored
//! for their group pair, and the evaluation time. [`Evaluator`] loads those
//! inputs from the directory and rule store and applies [`decide`].
//!
//! Precedence:
//!
//! 1. Same group: always allowed.
//! 2. Granting permanent rule for the pair.
//! 3. Granting group-wide temporary rule.
//! 4. Granting user-specific temporary rule requested by the sender.
//! 5. Granting user-specific temporary rule requested by someone else: denied.
//! 6. Nothing granting: denied.

use std::fmt;

use commgate_core::{CommunicationRule, GroupPair, Principal, PrincipalId, RuleId, RuleType};
use commgate_store::{Directory, RuleStore};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    SameGroup,
    PermanentRule,
    TemporaryGroupRule,
    TemporaryRule,
    UserSpecificMismatch,
    NoRule,
}

impl DecisionReason {
    /// Human-readable reason, as recorded in the message log.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::SameGroup => "same group",
            DecisionReason::PermanentRule => "permanent rule",
            DecisionReason::TemporaryGroupRule => "temporary group rule",
            DecisionReason::TemporaryRule => "temporary rule",
            DecisionReason::UserSpecificMismatch => {
                "temporary rule is user-specific and does not match sender"
            }
            DecisionReason::NoRule => "no communication rule found",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of evaluating one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,

    /// The rule that settled the decision, if one did.
    pub rule_id: Option<RuleId>,
}

impl Decision {
    fn allow(reason: DecisionReason, rule_id: Option<RuleId>) -> Self {
        Self {
            allowed: true,
            reason,
            rule_id,
        }
    }

    fn deny(reason: DecisionReason, rule_id: Option<RuleId>) -> Self {
        Self {
            allowed: false,
            reason,
            rule_id,
        }
    }
}

/// Decide whether `sender` may message `receiver` at `now`.
///
/// `rules` are the candidate rules for the pair, in any state. Rules that do
/// not govern exactly this pair are ignored, as are rules that do not grant
/// at `now`.
pub fn decide(
    sender: &Principal,
    receiver: &Principal,
    rules: &[CommunicationRule],
    now: i64,
) -> Decision {
    if sender.group_id == receiver.group_id {
        return Decision::allow(DecisionReason::SameGroup, None);
    }

    let granting: Vec<&CommunicationRule> = rules
        .iter()
        .filter(|r| r.touches(sender.group_id) && r.touches(receiver.group_id))
        .filter(|r| r.grants_at(now))
        .collect();

    if let Some(rule) = granting
        .iter()
        .find(|r| r.rule_type == RuleType::Permanent)
    {
        return Decision::allow(DecisionReason::PermanentRule, Some(rule.id));
    }

    let temporaries = || {
        granting
            .iter()
            .filter(|r| r.rule_type == RuleType::Temporary)
    };

    if let Some(rule) = temporaries().find(|r| !r.user_specific) {
        return Decision::allow(DecisionReason::TemporaryGroupRule, Some(rule.id));
    }

    if let Some(rule) = temporaries().find(|r| r.admits_sender(sender.id)) {
        return Decision::allow(DecisionReason::TemporaryRule, Some(rule.id));
    }

    if let Some(rule) = temporaries().next() {
        return Decision::deny(DecisionReason::UserSpecificMismatch, Some(rule.id));
    }

    Decision::deny(DecisionReason::NoRule, None)
}

/// Loads principals and pair rules, then applies [`decide`].
pub struct Evaluator<'a, D: ?Sized, R: ?Sized> {
    directory: &'a D,
    rules: &'a R,
}

impl<'a, D, R> Evaluator<'a, D, R>
where
    D: Directory + ?Sized,
    R: RuleStore + ?Sized,
{
    pub fn new(directory: &'a D, rules: &'a R) -> Self {
        Self { directory, rules }
    }

    /// Evaluate a send from `sender` to `receiver` at `now`.
    ///
    /// Reads rules fresh on every call, so expiry takes effect without any
    /// background job.
    ///
    /// # Returns
    /// - The decision, allowed or not.
    /// - `PrincipalNotFound` if either principal is unknown.
    pub async fn evaluate(
        &self,
        sender: PrincipalId,
        receiver: PrincipalId,
        now: i64,
    ) -> Result<Decision> {
        let sender = self.principal(sender).await?;
        let receiver = self.principal(receiver).await?;
        self.evaluate_principals(&sender, &receiver, now).await
    }

    /// Evaluate with principals the caller has already loaded.
    pub async fn evaluate_principals(
        &self,
        sender: &Principal,
        receiver: &Principal,
        now: i64,
    ) -> Result<Decision> {
        let rules = if sender.group_id == receiver.group_id {
            Vec::new()
        } else {
            let pair = GroupPair::new(sender.group_id, receiver.group_id)?;
            self.rules.find_by_pair(pair).await?
        };

        let decision = decide(sender, receiver, &rules, now);
        tracing::debug!(
            sender = %sender.id,
            receiver = %receiver.id,
            allowed = decision.allowed,
            reason = %decision.reason,
            "evaluated communication"
        );

        Ok(decision)
    }

    async fn principal(&self, id: PrincipalId) -> Result<Principal> {
        self.directory
            .get_principal(id)
            .await?
            .ok_or(PolicyError::PrincipalNotFound(id))
    }
}
