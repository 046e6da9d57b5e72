//! Reachability: the full set of principals a sender may message.
//!
//! Computed from the same granting rules the evaluator consults, so for any
//! principal `q` other than the sender, `q` is in the set exactly when
//! evaluating a send to `q` at the same instant is allowed.

use std::collections::{BTreeSet, HashSet};

use commgate_core::{CommunicationRule, GroupId, Principal, PrincipalId};
use commgate_store::{Directory, RuleStore};

use crate::error::{PolicyError, Result};

/// Groups whose members `sender` may message at `now`, own group included.
///
/// A granting rule touching the sender's group opens its other side when the
/// rule admits the sender: always for permanent and group-wide temporary
/// rules, and only for the requester under a user-specific rule.
pub fn reachable_groups(
    sender: &Principal,
    rules: &[CommunicationRule],
    now: i64,
) -> BTreeSet<GroupId> {
    let mut groups = BTreeSet::new();
    groups.insert(sender.group_id);

    for rule in rules {
        if !rule.grants_at(now) || !rule.admits_sender(sender.id) {
            continue;
        }
        if let Some(other) = rule.other_group(sender.group_id) {
            groups.insert(other);
        }
    }

    groups
}

/// Loads the sender's granting rules and expands them to principals.
pub struct Resolver<'a, D: ?Sized, R: ?Sized> {
    directory: &'a D,
    rules: &'a R,
}

impl<'a, D, R> Resolver<'a, D, R>
where
    D: Directory + ?Sized,
    R: RuleStore + ?Sized,
{
    pub fn new(directory: &'a D, rules: &'a R) -> Self {
        Self { directory, rules }
    }

    /// Ids of every principal `sender` may message at `now`, excluding the
    /// sender.
    pub async fn communicable(&self, sender: PrincipalId, now: i64) -> Result<HashSet<PrincipalId>> {
        let principals = self.communicable_principals(sender, now).await?;
        Ok(principals.into_iter().map(|p| p.id).collect())
    }

    /// Same set as [`communicable`](Self::communicable), as full records
    /// ordered by id.
    pub async fn communicable_principals(
        &self,
        sender: PrincipalId,
        now: i64,
    ) -> Result<Vec<Principal>> {
        let sender = self
            .directory
            .get_principal(sender)
            .await?
            .ok_or(PolicyError::PrincipalNotFound(sender))?;

        let rules = self.rules.find_active_by_group(sender.group_id, now).await?;
        let groups: Vec<GroupId> = reachable_groups(&sender, &rules, now).into_iter().collect();

        let mut principals = self.directory.list_principals_in(&groups).await?;
        principals.retain(|p| p.id != sender.id);

        tracing::debug!(
            sender = %sender.id,
            groups = groups.len(),
            principals = principals.len(),
            "resolved communicable set"
        );

        Ok(principals)
    }
}
