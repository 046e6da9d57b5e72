//! Proptest generators for property-based testing.
//!
//! [`OrgParams`] describes a random organization: some groups, principals
//! spread across them, and a mix of permanent and temporary rules in every
//! status, some of them expired at the evaluation time. [`seed_params`]
//! materializes it in any store.

use proptest::prelude::*;

use commgate_core::{
    GroupId, NewPrincipal, NewRule, Principal, RuleDecision, RuleStatus, Role,
};
use commgate_store::{Directory, Result, RuleStore, StoreError};

/// Evaluation time for generated organizations. Expiries fall on both sides.
pub const EVAL_AT: i64 = 1_000_000;

/// Generate a role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Admin),
        Just(Role::Manager),
        Just(Role::User),
        Just(Role::Auditor),
    ]
}

/// Generate a rule status.
pub fn rule_status() -> impl Strategy<Value = RuleStatus> {
    prop_oneof![
        Just(RuleStatus::Pending),
        Just(RuleStatus::Approved),
        Just(RuleStatus::Rejected),
    ]
}

/// Shape of one generated rule. Indices are reduced modulo the number of
/// groups or principals when seeding.
#[derive(Debug, Clone)]
pub enum RuleSpec {
    Permanent {
        group_a: usize,
        group_b: usize,
    },
    Temporary {
        requester: usize,
        target_group: usize,
        user_specific: bool,
        status: RuleStatus,
        /// Absolute expiry, if any. May precede [`EVAL_AT`].
        expires_at: Option<i64>,
    },
}

fn rule_spec() -> impl Strategy<Value = RuleSpec> {
    prop_oneof![
        (any::<usize>(), any::<usize>())
            .prop_map(|(group_a, group_b)| RuleSpec::Permanent { group_a, group_b }),
        (
            any::<usize>(),
            any::<usize>(),
            any::<bool>(),
            rule_status(),
            proptest::option::of(1i64..=2 * EVAL_AT),
        )
            .prop_map(
                |(requester, target_group, user_specific, status, expires_at)| {
                    RuleSpec::Temporary {
                        requester,
                        target_group,
                        user_specific,
                        status,
                        expires_at,
                    }
                }
            ),
    ]
}

/// Parameters for generating an organization.
#[derive(Debug, Clone)]
pub struct OrgParams {
    pub groups: usize,
    /// Group index and role of each principal.
    pub principals: Vec<(usize, Role)>,
    pub rules: Vec<RuleSpec>,
}

impl Arbitrary for OrgParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            2usize..=5,
            prop::collection::vec((any::<usize>(), role()), 1..=12),
            prop::collection::vec(rule_spec(), 0..=10),
        )
            .prop_map(|(groups, principals, rules)| OrgParams {
                groups,
                principals: principals
                    .into_iter()
                    .map(|(group, role)| (group % groups, role))
                    .collect(),
                rules,
            })
            .boxed()
    }
}

/// A materialized [`OrgParams`].
#[derive(Debug, Clone)]
pub struct SeededOrg {
    pub groups: Vec<GroupId>,
    pub principals: Vec<Principal>,
    /// Rules that were skipped as self-pairs or duplicate permanent links.
    pub skipped: usize,
}

/// Insert the organization described by `params`.
///
/// Rule specs that cannot be stored (self-pairs, a second permanent rule on
/// a pair) are counted in [`SeededOrg::skipped`] rather than failing.
pub async fn seed_params<S>(store: &S, params: &OrgParams) -> Result<SeededOrg>
where
    S: Directory + RuleStore + ?Sized,
{
    let mut groups = Vec::with_capacity(params.groups);
    for i in 0..params.groups {
        groups.push(store.insert_group(&format!("group-{}", i)).await?.id);
    }

    let mut principals = Vec::with_capacity(params.principals.len());
    for (i, (group, role)) in params.principals.iter().enumerate() {
        let new = NewPrincipal::new(
            format!("user-{}", i),
            format!("user-{}@example.com", i),
            groups[*group % groups.len()],
            *role,
        );
        principals.push(store.insert_principal(new).await?);
    }

    let mut skipped = 0;
    for spec in &params.rules {
        match spec {
            RuleSpec::Permanent { group_a, group_b } => {
                let a = groups[group_a % groups.len()];
                let b = groups[group_b % groups.len()];
                if a == b {
                    skipped += 1;
                    continue;
                }
                let rule = NewRule::permanent(a, b, principals[0].id, "", 0);
                match store.insert_rule(rule).await {
                    Ok(_) => {}
                    Err(StoreError::Conflict(_)) => skipped += 1,
                    Err(e) => return Err(e),
                }
            }
            RuleSpec::Temporary {
                requester,
                target_group,
                user_specific,
                status,
                expires_at,
            } => {
                let requester = &principals[requester % principals.len()];
                let target = groups[target_group % groups.len()];
                if target == requester.group_id {
                    skipped += 1;
                    continue;
                }

                let target_principal = if *user_specific {
                    principals
                        .iter()
                        .find(|p| p.group_id == target)
                        .map(|p| p.id)
                } else {
                    None
                };
                let rule = store
                    .insert_rule(NewRule::temporary(
                        requester.id,
                        requester.group_id,
                        target,
                        target_principal,
                        "",
                        *expires_at,
                        0,
                    ))
                    .await?;

                let decision = match status {
                    RuleStatus::Pending => None,
                    RuleStatus::Approved => Some(RuleDecision::approve(requester.id, None, 0)),
                    RuleStatus::Rejected => Some(RuleDecision::reject(requester.id, None, 0)),
                };
                if let Some(decision) = decision {
                    store.decide_rule(rule.id, &decision).await?;
                }
            }
        }
    }

    Ok(SeededOrg {
        groups,
        principals,
        skipped,
    })
}
