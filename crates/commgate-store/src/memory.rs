//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Each mutation runs
//! under a single write-lock acquisition, which gives it the same
//! read-modify-write atomicity as a SQLite transaction.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use commgate_core::{
    validate_new_rule, CommunicationRule, Group, GroupId, GroupPair, MessageId, MessageRecord,
    NewMessage, NewPrincipal, NewRule, Page, Principal, PrincipalId, RuleDecision, RuleId,
    RuleType,
};

use crate::error::{Result, StoreError};
use crate::traits::{Directory, MessageLog, RuleQuery, RuleStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    groups: BTreeMap<GroupId, Group>,
    principals: BTreeMap<PrincipalId, Principal>,
    rules: BTreeMap<RuleId, CommunicationRule>,
    messages: Vec<MessageRecord>,

    /// Last assigned row id per table.
    last_group: i64,
    last_principal: i64,
    last_rule: i64,
    last_message: i64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut messages: Vec<MessageRecord>, page: Page) -> Vec<MessageRecord> {
    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
    page.apply(messages)
}

#[async_trait]
impl Directory for MemoryStore {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        Ok(self.read()?.principals.get(&id).cloned())
    }

    async fn list_principals(&self, group: GroupId) -> Result<Vec<Principal>> {
        self.list_principals_in(&[group]).await
    }

    async fn list_principals_in(&self, groups: &[GroupId]) -> Result<Vec<Principal>> {
        let inner = self.read()?;
        Ok(inner
            .principals
            .values()
            .filter(|p| groups.contains(&p.group_id))
            .cloned()
            .collect())
    }

    async fn insert_group(&self, name: &str) -> Result<Group> {
        let mut inner = self.write()?;

        if inner.groups.values().any(|g| g.name == name) {
            return Err(StoreError::Conflict(format!("group name {:?} is taken", name)));
        }

        inner.last_group += 1;
        let group = Group {
            id: GroupId(inner.last_group),
            name: name.to_string(),
        };
        inner.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn insert_principal(&self, principal: NewPrincipal) -> Result<Principal> {
        let mut inner = self.write()?;

        if !inner.groups.contains_key(&principal.group_id) {
            return Err(StoreError::NotFound(format!("group {}", principal.group_id)));
        }
        if inner.principals.values().any(|p| p.email == principal.email) {
            return Err(StoreError::Conflict(format!(
                "email {:?} is taken",
                principal.email
            )));
        }

        inner.last_principal += 1;
        let stored = Principal {
            id: PrincipalId(inner.last_principal),
            name: principal.name,
            email: principal.email,
            group_id: principal.group_id,
            role: principal.role,
        };
        inner.principals.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn get_rule(&self, id: RuleId) -> Result<Option<CommunicationRule>> {
        Ok(self.read()?.rules.get(&id).cloned())
    }

    async fn find_by_pair(&self, pair: GroupPair) -> Result<Vec<CommunicationRule>> {
        let inner = self.read()?;
        Ok(inner
            .rules
            .values()
            .filter(|r| r.pair().map_or(false, |p| p == pair))
            .cloned()
            .collect())
    }

    async fn find_active_by_group(
        &self,
        group: GroupId,
        now: i64,
    ) -> Result<Vec<CommunicationRule>> {
        self.list_rules(&RuleQuery::new().group(group).granting_at(now))
            .await
    }

    async fn list_rules(&self, query: &RuleQuery) -> Result<Vec<CommunicationRule>> {
        let inner = self.read()?;
        let matching = inner.rules.values().filter(|r| query.matches(r)).cloned();

        Ok(match query.page {
            Some(page) => page.apply(matching),
            None => matching.collect(),
        })
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<CommunicationRule> {
        validate_new_rule(&rule)?;
        let pair = rule.pair()?;

        let mut inner = self.write()?;

        for group in [rule.group_a, rule.group_b] {
            if !inner.groups.contains_key(&group) {
                return Err(StoreError::NotFound(format!("group {}", group)));
            }
        }

        if rule.rule_type == RuleType::Permanent {
            let duplicate = inner.rules.values().find(|r| {
                r.rule_type == RuleType::Permanent && r.pair().map_or(false, |p| p == pair)
            });
            if let Some(existing) = duplicate {
                return Err(StoreError::Conflict(format!(
                    "permanent rule {} already links groups {} and {}",
                    existing.id,
                    pair.lo(),
                    pair.hi()
                )));
            }
        }

        inner.last_rule += 1;
        let stored = rule.into_rule(RuleId(inner.last_rule));
        inner.rules.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn decide_rule(
        &self,
        id: RuleId,
        decision: &RuleDecision,
    ) -> Result<CommunicationRule> {
        let mut inner = self.write()?;
        let rule = inner
            .rules
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {}", id)))?;

        rule.apply_decision(decision)?;
        Ok(rule.clone())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<bool> {
        Ok(self.write()?.rules.remove(&id).is_some())
    }
}

#[async_trait]
impl MessageLog for MemoryStore {
    async fn record_message(&self, message: NewMessage) -> Result<MessageRecord> {
        let mut inner = self.write()?;
        inner.last_message += 1;
        let record = message.into_record(MessageId(inner.last_message));
        inner.messages.push(record.clone());
        Ok(record)
    }

    async fn list_sent(&self, principal: PrincipalId, page: Page) -> Result<Vec<MessageRecord>> {
        let inner = self.read()?;
        let sent = inner
            .messages
            .iter()
            .filter(|m| m.sender_id == principal)
            .cloned()
            .collect();
        Ok(newest_first(sent, page))
    }

    async fn list_received(
        &self,
        principal: PrincipalId,
        page: Page,
    ) -> Result<Vec<MessageRecord>> {
        let inner = self.read()?;
        let received = inner
            .messages
            .iter()
            .filter(|m| m.receiver_id == principal)
            .cloned()
            .collect();
        Ok(newest_first(received, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commgate_core::{DeliveryStatus, Role, RuleStatus};

    async fn two_groups(store: &MemoryStore) -> (Group, Group) {
        let eng = store.insert_group("Eng").await.unwrap();
        let hr = store.insert_group("HR").await.unwrap();
        (eng, hr)
    }

    #[tokio::test]
    async fn test_memory_store_directory() {
        let store = MemoryStore::new();
        let (eng, hr) = two_groups(&store).await;

        let alice = store
            .insert_principal(NewPrincipal::new("Alice", "alice@x", eng.id, Role::User))
            .await
            .unwrap();
        store
            .insert_principal(NewPrincipal::new("Bob", "bob@x", hr.id, Role::User))
            .await
            .unwrap();

        assert_eq!(store.get_principal(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.list_principals(eng.id).await.unwrap(), vec![alice]);
        assert_eq!(
            store.list_principals_in(&[eng.id, hr.id]).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_memory_store_unique_names() {
        let store = MemoryStore::new();
        let (eng, _) = two_groups(&store).await;

        assert!(matches!(
            store.insert_group("Eng").await,
            Err(StoreError::Conflict(_))
        ));

        store
            .insert_principal(NewPrincipal::new("A", "a@x", eng.id, Role::User))
            .await
            .unwrap();
        assert!(matches!(
            store
                .insert_principal(NewPrincipal::new("A2", "a@x", eng.id, Role::User))
                .await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store
                .insert_principal(NewPrincipal::new("B", "b@x", GroupId(99), Role::User))
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_permanent_conflict_is_unordered() {
        let store = MemoryStore::new();
        let (eng, hr) = two_groups(&store).await;

        store
            .insert_rule(NewRule::permanent(eng.id, hr.id, PrincipalId(1), "", 0))
            .await
            .unwrap();

        let again = store
            .insert_rule(NewRule::permanent(hr.id, eng.id, PrincipalId(1), "", 0))
            .await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_memory_store_decide() {
        let store = MemoryStore::new();
        let (eng, hr) = two_groups(&store).await;

        let rule = store
            .insert_rule(NewRule::temporary(
                PrincipalId(1),
                eng.id,
                hr.id,
                None,
                "audit",
                None,
                0,
            ))
            .await
            .unwrap();

        let decided = store
            .decide_rule(rule.id, &RuleDecision::approve(PrincipalId(2), Some("fine".into()), 5))
            .await
            .unwrap();
        assert_eq!(decided.status, RuleStatus::Approved);
        assert_eq!(decided.reason, "audit | Approval: fine");
        assert_eq!(store.get_rule(rule.id).await.unwrap(), Some(decided));

        let missing = store
            .decide_rule(RuleId(42), &RuleDecision::approve(PrincipalId(2), None, 5))
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_active_by_group_skips_expired() {
        let store = MemoryStore::new();
        let (eng, hr) = two_groups(&store).await;

        let rule = store
            .insert_rule(NewRule::temporary(
                PrincipalId(1),
                eng.id,
                hr.id,
                None,
                "",
                Some(1_000),
                0,
            ))
            .await
            .unwrap();
        store
            .decide_rule(rule.id, &RuleDecision::approve(PrincipalId(2), None, 1))
            .await
            .unwrap();

        assert_eq!(store.find_active_by_group(hr.id, 999).await.unwrap().len(), 1);
        assert!(store.find_active_by_group(hr.id, 1_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_messages_newest_first() {
        let store = MemoryStore::new();
        for at in [10, 30, 20] {
            store
                .record_message(NewMessage {
                    sender_id: PrincipalId(1),
                    receiver_id: PrincipalId(2),
                    subject: None,
                    body: format!("at {}", at),
                    status: DeliveryStatus::Sent,
                    reason: None,
                    sent_at: at,
                })
                .await
                .unwrap();
        }

        let sent = store.list_sent(PrincipalId(1), Page::first(2)).await.unwrap();
        let times: Vec<i64> = sent.iter().map(|m| m.sent_at).collect();
        assert_eq!(times, vec![30, 20]);
        assert_eq!(
            store
                .list_received(PrincipalId(2), Page::default())
                .await
                .unwrap()
                .len(),
            3
        );
        assert!(store
            .list_received(PrincipalId(1), Page::default())
            .await
            .unwrap()
            .is_empty());
    }
}
