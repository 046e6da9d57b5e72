//! Rule lifecycle: creating, requesting, deciding, deleting, and listing
//! communication rules.
//!
//! Every entry point takes the already-resolved acting principal and applies
//! its role gate before touching the store. Read-modify-write steps (the
//! duplicate permanent check, applying a decision) happen inside a single
//! store mutation so concurrent callers cannot both pass a stale check.

use commgate_core::{
    CommunicationRule, GroupId, NewRule, Page, Principal, PrincipalId, RuleDecision, RuleId,
    RuleType,
};
use commgate_policy::{authorize, authorize_decision, Operation};
use commgate_store::{Directory, RuleQuery, RuleStore, StoreError};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// A request for temporary access to another group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryRequest {
    pub target_group: GroupId,
    /// Naming a principal makes the rule user-specific.
    pub target_principal: Option<PrincipalId>,
    pub reason: String,
    /// Lifetime after approval is possible. `None` never expires.
    pub expiry_hours: Option<i64>,
}

impl TemporaryRequest {
    /// Group-wide access to `target_group` with no expiry.
    pub fn new(target_group: GroupId, reason: impl Into<String>) -> Self {
        Self {
            target_group,
            target_principal: None,
            reason: reason.into(),
            expiry_hours: None,
        }
    }

    pub fn target_principal(mut self, principal: PrincipalId) -> Self {
        self.target_principal = Some(principal);
        self
    }

    pub fn expiry_hours(mut self, hours: i64) -> Self {
        self.expiry_hours = Some(hours);
        self
    }
}

/// Rule administration over a directory and a rule store.
pub struct RuleLifecycle<'a, S: ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S> RuleLifecycle<'a, S>
where
    S: Directory + RuleStore + ?Sized,
{
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Link two groups permanently. Admin only.
    ///
    /// # Returns
    /// - The stored rule, approved and live immediately.
    /// - `Conflict` if the groups are equal or the pair already has a
    ///   permanent rule, in either order.
    /// - `NotFound` if either group is unknown.
    pub async fn create_permanent(
        &self,
        actor: &Principal,
        group_a: GroupId,
        group_b: GroupId,
        reason: &str,
        now: i64,
    ) -> Result<CommunicationRule> {
        authorize(actor, Operation::CreatePermanentRule)?;

        if group_a == group_b {
            return Err(EngineError::Conflict(format!(
                "cannot create a rule linking group {} to itself",
                group_a
            )));
        }
        self.require_group(group_a).await?;
        self.require_group(group_b).await?;

        let rule = NewRule::permanent(group_a, group_b, actor.id, reason, now);
        let stored = match self.store.insert_rule(rule).await {
            Ok(stored) => stored,
            Err(StoreError::Conflict(detail)) => {
                tracing::warn!(
                    group_a = %group_a,
                    group_b = %group_b,
                    "duplicate permanent rule rejected"
                );
                return Err(EngineError::Conflict(detail));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            rule = %stored.id,
            group_a = %group_a,
            group_b = %group_b,
            approver = %actor.id,
            "created permanent rule"
        );
        Ok(stored)
    }

    /// File a pending temporary rule from `actor`'s group to another group.
    ///
    /// # Returns
    /// - The stored rule, pending and undecided.
    /// - `InvalidArgument` if the target is the requester's own group or the
    ///   expiry is out of range.
    /// - `NotFound` if the target group is unknown, or the target principal
    ///   is not a member of it.
    pub async fn request_temporary(
        &self,
        actor: &Principal,
        request: TemporaryRequest,
        now: i64,
    ) -> Result<CommunicationRule> {
        authorize(actor, Operation::RequestTemporaryRule)?;

        if request.target_group == actor.group_id {
            return Err(EngineError::InvalidArgument(
                "cannot request access to your own group".into(),
            ));
        }
        self.require_group(request.target_group).await?;

        if let Some(target) = request.target_principal {
            let member = self.store.get_principal(target).await?;
            if !member.is_some_and(|p| p.group_id == request.target_group) {
                return Err(EngineError::NotFound(format!(
                    "principal {} in group {}",
                    target, request.target_group
                )));
            }
        }

        let expires_at = self.config.expiry(now, request.expiry_hours)?;
        let rule = NewRule::temporary(
            actor.id,
            actor.group_id,
            request.target_group,
            request.target_principal,
            request.reason,
            expires_at,
            now,
        );
        let stored = self.store.insert_rule(rule).await?;

        tracing::info!(
            rule = %stored.id,
            requester = %actor.id,
            target_group = %request.target_group,
            user_specific = stored.user_specific,
            "requested temporary rule"
        );
        Ok(stored)
    }

    /// Undecided or rejected temporary rules touching `actor`'s group.
    /// Rejected requests stay listed since they can still be approved.
    /// Manager or admin.
    pub async fn list_pending(
        &self,
        actor: &Principal,
        page: Option<Page>,
    ) -> Result<Vec<CommunicationRule>> {
        authorize(actor, Operation::ListPendingRules)?;

        let query = RuleQuery::new()
            .group(actor.group_id)
            .rule_type(RuleType::Temporary)
            .not_approved()
            .page(self.config.page(page));
        Ok(self.store.list_rules(&query).await?)
    }

    /// Approve or reject a temporary rule.
    ///
    /// Admins may decide any rule; managers only rules touching their group.
    /// A note, when given, is appended to the rule's reason history.
    ///
    /// # Returns
    /// - The updated rule.
    /// - `NotFound` if the rule does not exist.
    /// - `InvalidArgument` if the rule is permanent.
    /// - `Forbidden` if the actor may not decide it.
    pub async fn decide(
        &self,
        actor: &Principal,
        rule_id: RuleId,
        approve: bool,
        note: Option<String>,
        now: i64,
    ) -> Result<CommunicationRule> {
        authorize(actor, Operation::DecideRule)?;

        let rule = self
            .store
            .get_rule(rule_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("rule {}", rule_id)))?;

        if rule.rule_type != RuleType::Temporary {
            return Err(EngineError::InvalidArgument(format!(
                "rule {} is permanent and cannot be decided",
                rule_id
            )));
        }
        authorize_decision(actor, &rule)?;

        let decision = if approve {
            RuleDecision::approve(actor.id, note, now)
        } else {
            RuleDecision::reject(actor.id, note, now)
        };
        let updated = self.store.decide_rule(rule_id, &decision).await?;

        tracing::info!(
            rule = %rule_id,
            decided_by = %actor.id,
            status = %updated.status,
            "decided temporary rule"
        );
        Ok(updated)
    }

    /// Remove any rule. Admin only.
    pub async fn delete(&self, actor: &Principal, rule_id: RuleId) -> Result<()> {
        authorize(actor, Operation::DeleteRule)?;

        if !self.store.delete_rule(rule_id).await? {
            return Err(EngineError::NotFound(format!("rule {}", rule_id)));
        }

        tracing::info!(rule = %rule_id, actor = %actor.id, "deleted rule");
        Ok(())
    }

    /// Filtered listing. The page is resolved against the configured limits.
    pub async fn list(&self, actor: &Principal, query: RuleQuery) -> Result<Vec<CommunicationRule>> {
        authorize(actor, Operation::ListRules)?;

        let page = self.config.page(query.page);
        Ok(self.store.list_rules(&query.page(page)).await?)
    }

    async fn require_group(&self, id: GroupId) -> Result<()> {
        match self.store.get_group(id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(format!("group {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commgate_core::{NewPrincipal, Role, RuleStatus, HOUR_MS, REASON_SEPARATOR};
    use commgate_store::MemoryStore;

    const NOW: i64 = 1_700_000_000_000;

    struct Setup {
        store: MemoryStore,
        config: EngineConfig,
        eng: GroupId,
        hr: GroupId,
        sales: GroupId,
        admin: Principal,
        hr_manager: Principal,
        alice: Principal,
        carol: Principal,
    }

    impl Setup {
        fn lifecycle(&self) -> RuleLifecycle<'_, MemoryStore> {
            RuleLifecycle::new(&self.store, &self.config)
        }
    }

    async fn setup() -> Setup {
        let store = MemoryStore::new();
        let eng = store.insert_group("Eng").await.unwrap().id;
        let hr = store.insert_group("HR").await.unwrap().id;
        let sales = store.insert_group("Sales").await.unwrap().id;

        let admin = store
            .insert_principal(NewPrincipal::new("Root", "root@example.com", eng, Role::Admin))
            .await
            .unwrap();
        let hr_manager = store
            .insert_principal(NewPrincipal::new("Hana", "hana@example.com", hr, Role::Manager))
            .await
            .unwrap();
        let alice = store
            .insert_principal(NewPrincipal::new("Alice", "alice@example.com", eng, Role::User))
            .await
            .unwrap();
        let carol = store
            .insert_principal(NewPrincipal::new("Carol", "carol@example.com", sales, Role::User))
            .await
            .unwrap();

        Setup {
            store,
            config: EngineConfig::default(),
            eng,
            hr,
            sales,
            admin,
            hr_manager,
            alice,
            carol,
        }
    }

    #[tokio::test]
    async fn test_create_permanent_requires_admin() {
        let s = setup().await;
        let err = s
            .lifecycle()
            .create_permanent(&s.hr_manager, s.eng, s.hr, "", NOW)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_create_permanent_conflicts() {
        let s = setup().await;
        let lifecycle = s.lifecycle();

        let rule = lifecycle
            .create_permanent(&s.admin, s.eng, s.hr, "payroll", NOW)
            .await
            .unwrap();
        assert!(rule.is_active());
        assert_eq!(rule.decided_by, Some(s.admin.id));

        let again = lifecycle
            .create_permanent(&s.admin, s.hr, s.eng, "payroll", NOW)
            .await
            .unwrap_err();
        assert!(again.is_conflict());

        let own = lifecycle
            .create_permanent(&s.admin, s.eng, s.eng, "", NOW)
            .await
            .unwrap_err();
        assert!(own.is_conflict());

        let missing = lifecycle
            .create_permanent(&s.admin, s.eng, GroupId(404), "", NOW)
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_request_temporary_validation() {
        let s = setup().await;
        let lifecycle = s.lifecycle();

        let own = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.eng, ""), NOW)
            .await
            .unwrap_err();
        assert!(own.is_invalid_argument());

        let missing_group = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(GroupId(404), ""), NOW)
            .await
            .unwrap_err();
        assert!(missing_group.is_not_found());

        // Carol is in Sales, not HR.
        let wrong_member = lifecycle
            .request_temporary(
                &s.alice,
                TemporaryRequest::new(s.hr, "").target_principal(s.carol.id),
                NOW,
            )
            .await
            .unwrap_err();
        assert!(wrong_member.is_not_found());

        let bad_expiry = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.hr, "").expiry_hours(0), NOW)
            .await
            .unwrap_err();
        assert!(bad_expiry.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_request_temporary_shape() {
        let s = setup().await;
        let rule = s
            .lifecycle()
            .request_temporary(
                &s.alice,
                TemporaryRequest::new(s.sales, "launch")
                    .target_principal(s.carol.id)
                    .expiry_hours(24),
                NOW,
            )
            .await
            .unwrap();

        assert_eq!(rule.status, RuleStatus::Pending);
        assert_eq!(rule.decided_by, None);
        assert_eq!(rule.requester_id, Some(s.alice.id));
        assert!(rule.user_specific);
        assert_eq!(rule.expires_at, Some(NOW + 24 * HOUR_MS));
        assert_eq!(rule.group_a, s.eng);
        assert_eq!(rule.group_b, s.sales);
    }

    #[tokio::test]
    async fn test_decide_scope_and_history() {
        let s = setup().await;
        let lifecycle = s.lifecycle();
        let rule = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.sales, "launch"), NOW)
            .await
            .unwrap();

        // HR manager is outside Eng and Sales.
        let err = lifecycle
            .decide(&s.hr_manager, rule.id, true, None, NOW)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());

        let err = lifecycle
            .decide(&s.alice, rule.id, true, None, NOW)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());

        let rejected = lifecycle
            .decide(&s.admin, rule.id, false, Some("not yet".into()), NOW + 1)
            .await
            .unwrap();
        assert_eq!(rejected.status, RuleStatus::Rejected);
        assert_eq!(rejected.decided_by, Some(s.admin.id));

        let approved = lifecycle
            .decide(&s.admin, rule.id, true, Some("ok now".into()), NOW + 2)
            .await
            .unwrap();
        assert!(approved.is_active());
        assert_eq!(
            approved.reason,
            format!("launch{0}Rejected: not yet{0}Approval: ok now", REASON_SEPARATOR)
        );
    }

    #[tokio::test]
    async fn test_decide_permanent_and_missing() {
        let s = setup().await;
        let lifecycle = s.lifecycle();
        let permanent = lifecycle
            .create_permanent(&s.admin, s.eng, s.hr, "", NOW)
            .await
            .unwrap();

        let err = lifecycle
            .decide(&s.admin, permanent.id, true, None, NOW)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = lifecycle
            .decide(&s.admin, RuleId(999), true, None, NOW)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_pending_touches_actor_group() {
        let s = setup().await;
        let lifecycle = s.lifecycle();
        lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.hr, "to hr"), NOW)
            .await
            .unwrap();
        let to_sales = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.sales, "to sales"), NOW)
            .await
            .unwrap();

        let pending = lifecycle.list_pending(&s.hr_manager, None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "to hr");

        lifecycle
            .decide(&s.admin, to_sales.id, true, None, NOW)
            .await
            .unwrap();
        let pending = lifecycle.list_pending(&s.admin, None).await.unwrap();
        assert_eq!(pending.len(), 1);

        let err = lifecycle.list_pending(&s.alice, None).await.unwrap_err();
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_rejected_request_stays_pending() {
        let s = setup().await;
        let lifecycle = s.lifecycle();
        let rule = lifecycle
            .request_temporary(&s.alice, TemporaryRequest::new(s.hr, "audit"), NOW)
            .await
            .unwrap();
        lifecycle
            .decide(&s.hr_manager, rule.id, false, Some("not now".into()), NOW + 1)
            .await
            .unwrap();

        let pending = lifecycle.list_pending(&s.hr_manager, None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, rule.id);
        assert_eq!(pending[0].status, RuleStatus::Rejected);

        // Approving later takes it off the list.
        lifecycle
            .decide(&s.hr_manager, rule.id, true, None, NOW + 2)
            .await
            .unwrap();
        assert!(lifecycle
            .list_pending(&s.hr_manager, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let s = setup().await;
        let lifecycle = s.lifecycle();
        let permanent = lifecycle
            .create_permanent(&s.admin, s.eng, s.hr, "", NOW)
            .await
            .unwrap();
        lifecycle
            .request_temporary(&s.carol, TemporaryRequest::new(s.hr, ""), NOW)
            .await
            .unwrap();

        let all = lifecycle.list(&s.alice, RuleQuery::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let permanent_only = lifecycle
            .list(&s.alice, RuleQuery::new().rule_type(RuleType::Permanent))
            .await
            .unwrap();
        assert_eq!(permanent_only.len(), 1);

        let sales_only = lifecycle
            .list(&s.alice, RuleQuery::new().group(s.sales))
            .await
            .unwrap();
        assert_eq!(sales_only.len(), 1);

        let paged = lifecycle
            .list(&s.alice, RuleQuery::new().page(Page::new(1, 10)))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);

        assert!(lifecycle
            .delete(&s.alice, permanent.id)
            .await
            .unwrap_err()
            .is_forbidden());
        lifecycle.delete(&s.admin, permanent.id).await.unwrap();
        assert!(lifecycle
            .delete(&s.admin, permanent.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
