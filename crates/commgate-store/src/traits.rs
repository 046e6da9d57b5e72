//! Store traits: the abstract interfaces for directory, rule, and message
//! log persistence.
//!
//! These traits keep the evaluator and lifecycle code storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use commgate_core::{
    CommunicationRule, Group, GroupId, GroupPair, MessageRecord, NewMessage, NewPrincipal,
    NewRule, Page, Principal, PrincipalId, RuleDecision, RuleId, RuleStatus, RuleType,
};

use crate::error::Result;

/// Filters for listing rules. Unset fields do not constrain the result.
///
/// Results are ordered by rule id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    /// Rules touching this group on either side.
    pub group: Option<GroupId>,
    pub rule_type: Option<RuleType>,
    pub status: Option<RuleStatus>,
    /// Only rules awaiting a decision or rejected.
    pub not_approved: bool,
    pub requester: Option<PrincipalId>,
    pub decided_by: Option<PrincipalId>,
    /// Only rules that grant at this Unix ms (approved and unexpired).
    pub granting_at: Option<i64>,
    pub page: Option<Page>,
}

impl RuleQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = Some(rule_type);
        self
    }

    pub fn status(mut self, status: RuleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn not_approved(mut self) -> Self {
        self.not_approved = true;
        self
    }

    pub fn requester(mut self, requester: PrincipalId) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn decided_by(mut self, decider: PrincipalId) -> Self {
        self.decided_by = Some(decider);
        self
    }

    pub fn granting_at(mut self, now: i64) -> Self {
        self.granting_at = Some(now);
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Whether a rule passes every filter (paging aside).
    pub fn matches(&self, rule: &CommunicationRule) -> bool {
        self.group.map_or(true, |g| rule.touches(g))
            && self.rule_type.map_or(true, |t| rule.rule_type == t)
            && self.status.map_or(true, |s| rule.status == s)
            && (!self.not_approved || rule.status != RuleStatus::Approved)
            && self.requester.map_or(true, |r| rule.requester_id == Some(r))
            && self.decided_by.map_or(true, |d| rule.decided_by == Some(d))
            && self.granting_at.map_or(true, |now| rule.grants_at(now))
    }
}

/// Principal and group registry.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Get a group by id.
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>>;

    /// Get a principal by id.
    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>>;

    /// List the members of a group, ordered by id.
    async fn list_principals(&self, group: GroupId) -> Result<Vec<Principal>>;

    /// List the members of any of the given groups, ordered by id.
    async fn list_principals_in(&self, groups: &[GroupId]) -> Result<Vec<Principal>>;

    /// Register a group. Names are unique.
    async fn insert_group(&self, name: &str) -> Result<Group>;

    /// Register a principal. Emails are unique; the group must exist.
    async fn insert_principal(&self, principal: NewPrincipal) -> Result<Principal>;
}

/// Persisted communication rules.
///
/// # Atomicity
///
/// Every mutation is a single atomic read-modify-write:
/// - `insert_rule` checks for an existing permanent rule on the same pair and
///   inserts under the same transaction, returning `Conflict` on a duplicate.
/// - `decide_rule` loads, applies, and writes back under the same transaction.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Get a rule by id.
    async fn get_rule(&self, id: RuleId) -> Result<Option<CommunicationRule>>;

    /// All rules governing an unordered group pair, in any state.
    async fn find_by_pair(&self, pair: GroupPair) -> Result<Vec<CommunicationRule>>;

    /// Rules touching `group` that grant at `now`.
    async fn find_active_by_group(&self, group: GroupId, now: i64)
        -> Result<Vec<CommunicationRule>>;

    /// Filtered listing.
    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<CommunicationRule>>;

    /// Validate and insert a rule.
    ///
    /// # Returns
    /// - The stored rule with its assigned id.
    /// - `NotFound` if either group is unknown.
    /// - `Conflict` if the rule is permanent and its pair already has one.
    async fn insert_rule(&self, rule: NewRule) -> Result<CommunicationRule>;

    /// Apply a decision to a temporary rule.
    ///
    /// # Returns
    /// - The updated rule.
    /// - `NotFound` if the rule does not exist.
    /// - `Rule(NotTemporary)` if the rule is permanent.
    async fn decide_rule(&self, id: RuleId, decision: &RuleDecision)
        -> Result<CommunicationRule>;

    /// Remove a rule. Returns whether a row was removed.
    async fn delete_rule(&self, id: RuleId) -> Result<bool>;
}

/// Append-only log of send attempts.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Record a send attempt.
    async fn record_message(&self, message: NewMessage) -> Result<MessageRecord>;

    /// Messages sent by `principal`, newest first.
    async fn list_sent(&self, principal: PrincipalId, page: Page) -> Result<Vec<MessageRecord>>;

    /// Messages addressed to `principal`, newest first.
    async fn list_received(
        &self,
        principal: PrincipalId,
        page: Page,
    ) -> Result<Vec<MessageRecord>>;
}

/// A backend providing every storage concern.
pub trait Store: Directory + RuleStore + MessageLog {}

impl<T: Directory + RuleStore + MessageLog + ?Sized> Store for T {}
