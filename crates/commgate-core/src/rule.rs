//! Communication rules between groups.
//!
//! A rule links an unordered pair of groups. Permanent rules are standing
//! bidirectional grants created by an administrator. Temporary rules are
//! requested by a principal, start out pending, and only grant once approved
//! and while unexpired. Expiry is evaluated lazily against a caller-supplied
//! `now`; nothing ever rewrites a rule when it expires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{GroupId, GroupPair, PrincipalId, RuleId};

/// Separator between entries of a rule's reason history.
pub const REASON_SEPARATOR: &str = " | ";

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 3_600_000;

/// Shape of a communication rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Permanent,
    Temporary,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Permanent => "permanent",
            RuleType::Temporary => "temporary",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(RuleType::Permanent),
            "temporary" => Ok(RuleType::Temporary),
            _ => Err(CoreError::UnknownRuleType(s.to_string())),
        }
    }
}

/// Approval state of a rule.
///
/// Permanent rules are born `Approved`. Temporary rules start `Pending` and
/// move to `Approved` or `Rejected` when a decision is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Pending,
    Approved,
    Rejected,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Pending => "pending",
            RuleStatus::Approved => "approved",
            RuleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RuleStatus::Pending),
            "approved" => Ok(RuleStatus::Approved),
            "rejected" => Ok(RuleStatus::Rejected),
            _ => Err(CoreError::UnknownRuleStatus(s.to_string())),
        }
    }
}

/// A stored communication rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationRule {
    pub id: RuleId,

    /// First group as submitted. For temporary rules this is the requester's group.
    pub group_a: GroupId,

    /// Second group as submitted. For temporary rules this is the target group.
    pub group_b: GroupId,

    pub rule_type: RuleType,

    /// Who asked for the rule (temporary rules only).
    pub requester_id: Option<PrincipalId>,

    /// The principal the requester originally wanted to reach, if any.
    pub target_principal_id: Option<PrincipalId>,

    /// Who made the last decision. `None` while a temporary rule is undecided.
    pub decided_by: Option<PrincipalId>,

    /// Unix ms after which the rule no longer grants (temporary rules only).
    pub expires_at: Option<i64>,

    /// Restricts the eligible sender to `requester_id`.
    pub user_specific: bool,

    /// Free-text reason followed by the decision history.
    pub reason: String,

    pub status: RuleStatus,

    pub created_at: i64,
    pub updated_at: i64,
}

impl CommunicationRule {
    /// The unordered pair this rule governs.
    pub fn pair(&self) -> Result<GroupPair, CoreError> {
        GroupPair::new(self.group_a, self.group_b)
    }

    /// Whether the stored rule is approved. Says nothing about expiry.
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Approved
    }

    pub fn is_pending(&self) -> bool {
        self.status == RuleStatus::Pending
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }

    /// Whether this rule authorizes anything at `now`.
    pub fn grants_at(&self, now: i64) -> bool {
        self.is_active() && !self.is_expired(now)
    }

    /// Whether `sender` is an eligible sender under this rule.
    ///
    /// Group-wide rules admit any sender; user-specific rules only the requester.
    pub fn admits_sender(&self, sender: PrincipalId) -> bool {
        !self.user_specific || self.requester_id == Some(sender)
    }

    /// Whether either side of the rule is `group`.
    pub fn touches(&self, group: GroupId) -> bool {
        self.group_a == group || self.group_b == group
    }

    /// The side of the rule opposite `group`.
    pub fn other_group(&self, group: GroupId) -> Option<GroupId> {
        if self.group_a == group {
            Some(self.group_b)
        } else if self.group_b == group {
            Some(self.group_a)
        } else {
            None
        }
    }

    /// Apply an approval or rejection to a temporary rule.
    ///
    /// The note, when present, is appended to the reason history as
    /// `Approval: <note>` or `Rejected: <note>`.
    pub fn apply_decision(&mut self, decision: &RuleDecision) -> Result<(), CoreError> {
        if self.rule_type != RuleType::Temporary {
            return Err(CoreError::NotTemporary(self.id));
        }

        self.status = if decision.approve {
            RuleStatus::Approved
        } else {
            RuleStatus::Rejected
        };
        self.decided_by = Some(decision.decided_by);
        if let Some(annotation) = decision.annotation() {
            self.append_reason(&annotation);
        }
        self.updated_at = decision.at;

        Ok(())
    }

    fn append_reason(&mut self, entry: &str) {
        if !self.reason.is_empty() {
            self.reason.push_str(REASON_SEPARATOR);
        }
        self.reason.push_str(entry);
    }
}

/// A rule that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub group_a: GroupId,
    pub group_b: GroupId,
    pub rule_type: RuleType,
    pub requester_id: Option<PrincipalId>,
    pub target_principal_id: Option<PrincipalId>,
    pub decided_by: Option<PrincipalId>,
    pub expires_at: Option<i64>,
    pub user_specific: bool,
    pub reason: String,
    pub status: RuleStatus,
    pub created_at: i64,
}

impl NewRule {
    /// A standing rule, live from creation.
    pub fn permanent(
        group_a: GroupId,
        group_b: GroupId,
        approver: PrincipalId,
        reason: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            group_a,
            group_b,
            rule_type: RuleType::Permanent,
            requester_id: None,
            target_principal_id: None,
            decided_by: Some(approver),
            expires_at: None,
            user_specific: false,
            reason: reason.into(),
            status: RuleStatus::Approved,
            created_at: now,
        }
    }

    /// A pending temporary request from `requester` in `requester_group`.
    ///
    /// Naming a target principal makes the rule user-specific.
    pub fn temporary(
        requester: PrincipalId,
        requester_group: GroupId,
        target_group: GroupId,
        target_principal: Option<PrincipalId>,
        reason: impl Into<String>,
        expires_at: Option<i64>,
        now: i64,
    ) -> Self {
        Self {
            group_a: requester_group,
            group_b: target_group,
            rule_type: RuleType::Temporary,
            requester_id: Some(requester),
            target_principal_id: target_principal,
            decided_by: None,
            expires_at,
            user_specific: target_principal.is_some(),
            reason: reason.into(),
            status: RuleStatus::Pending,
            created_at: now,
        }
    }

    pub fn pair(&self) -> Result<GroupPair, CoreError> {
        GroupPair::new(self.group_a, self.group_b)
    }

    /// Materialize the stored row once the store has assigned an id.
    pub fn into_rule(self, id: RuleId) -> CommunicationRule {
        CommunicationRule {
            id,
            group_a: self.group_a,
            group_b: self.group_b,
            rule_type: self.rule_type,
            requester_id: self.requester_id,
            target_principal_id: self.target_principal_id,
            decided_by: self.decided_by,
            expires_at: self.expires_at,
            user_specific: self.user_specific,
            reason: self.reason,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// An approval or rejection of a temporary rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDecision {
    pub approve: bool,
    pub decided_by: PrincipalId,
    pub note: Option<String>,
    /// Unix ms of the decision.
    pub at: i64,
}

impl RuleDecision {
    pub fn approve(decided_by: PrincipalId, note: Option<String>, at: i64) -> Self {
        Self {
            approve: true,
            decided_by,
            note,
            at,
        }
    }

    pub fn reject(decided_by: PrincipalId, note: Option<String>, at: i64) -> Self {
        Self {
            approve: false,
            decided_by,
            note,
            at,
        }
    }

    /// The history entry this decision appends, if it carries a note.
    pub fn annotation(&self) -> Option<String> {
        let note = self.note.as_deref().filter(|n| !n.is_empty())?;
        Some(if self.approve {
            format!("Approval: {}", note)
        } else {
            format!("Rejected: {}", note)
        })
    }
}

/// Compute an absolute expiry from a relative number of hours.
pub fn expiry_after_hours(now: i64, hours: i64) -> Result<i64, CoreError> {
    if hours <= 0 {
        return Err(CoreError::InvalidExpiry(format!(
            "expiry_hours must be positive, got {}",
            hours
        )));
    }
    hours
        .checked_mul(HOUR_MS)
        .and_then(|ms| now.checked_add(ms))
        .ok_or_else(|| CoreError::InvalidExpiry(format!("expiry_hours {} overflows", hours)))
}
