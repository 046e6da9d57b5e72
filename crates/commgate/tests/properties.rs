//! Property tests over randomly generated organizations.

use std::collections::HashSet;

use commgate::store::MemoryStore;
use commgate::{Engine, EngineConfig, PrincipalId, RuleStatus};
use commgate_testkit::generators::{seed_params, OrgParams, RuleSpec, SeededOrg, EVAL_AT};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

async fn seeded(params: &OrgParams) -> (Engine<MemoryStore>, SeededOrg) {
    let store = MemoryStore::new();
    let org = seed_params(&store, params).await.expect("seed");
    (Engine::new(store, EngineConfig::default()), org)
}

/// For each sender: (communicable set, set of receivers evaluate allows).
async fn both_views(
    engine: &Engine<MemoryStore>,
    org: &SeededOrg,
    now: i64,
) -> Vec<(HashSet<PrincipalId>, HashSet<PrincipalId>)> {
    let mut views = Vec::new();
    for sender in &org.principals {
        let communicable = engine.communicable(sender.id, now).await.expect("communicable");
        let mut allowed = HashSet::new();
        for receiver in &org.principals {
            if receiver.id == sender.id {
                continue;
            }
            let decision = engine
                .evaluate(sender.id, receiver.id, now)
                .await
                .expect("evaluate");
            if decision.allowed {
                allowed.insert(receiver.id);
            }
        }
        views.push((communicable, allowed));
    }
    views
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_communicable_matches_evaluate(params: OrgParams, offset in -1_000i64..=1_000) {
        let now = EVAL_AT + offset;
        let views = runtime().block_on(async {
            let (engine, org) = seeded(&params).await;
            both_views(&engine, &org, now).await
        });
        for (communicable, allowed) in views {
            prop_assert_eq!(communicable, allowed);
        }
    }

    #[test]
    fn prop_same_group_always_allowed(params: OrgParams) {
        let pairs = runtime().block_on(async {
            let (engine, org) = seeded(&params).await;
            let mut results = Vec::new();
            for p in &org.principals {
                for q in &org.principals {
                    if p.group_id == q.group_id {
                        let d = engine.evaluate(p.id, q.id, EVAL_AT).await.expect("evaluate");
                        results.push(d.allowed);
                    }
                }
            }
            results
        });
        prop_assert!(pairs.into_iter().all(|allowed| allowed));
    }

    #[test]
    fn prop_undecided_and_rejected_rules_grant_nothing(params: OrgParams) {
        // Keep only temporary rules, none of them approved.
        let mut params = params;
        params.rules = params
            .rules
            .into_iter()
            .filter_map(|spec| match spec {
                RuleSpec::Permanent { .. } => None,
                RuleSpec::Temporary { requester, target_group, user_specific, status, expires_at } => {
                    let status = if status == RuleStatus::Approved { RuleStatus::Rejected } else { status };
                    Some(RuleSpec::Temporary { requester, target_group, user_specific, status, expires_at })
                }
            })
            .collect();

        let views = runtime().block_on(async {
            let (engine, org) = seeded(&params).await;
            let mut out = Vec::new();
            for p in &org.principals {
                for q in &org.principals {
                    let d = engine.evaluate(p.id, q.id, EVAL_AT).await.expect("evaluate");
                    out.push((p.group_id == q.group_id, d.allowed));
                }
            }
            out
        });
        for (same_group, allowed) in views {
            prop_assert_eq!(same_group, allowed);
        }
    }
}
