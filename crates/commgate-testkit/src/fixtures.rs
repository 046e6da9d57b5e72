//! Test fixtures and helpers.
//!
//! The reference organization: groups Eng, HR, and Sales (ids 1, 2, 3 on a
//! fresh store), one plain user in each, a second Eng user, an admin, and a
//! manager for HR and for Sales.

use commgate_core::{
    GroupId, NewPrincipal, NewRule, Principal, RuleDecision, RuleId, Role, HOUR_MS,
};
use commgate_store::{Directory, MemoryStore, Result, RuleStore};

/// Fixed evaluation time used by fixtures and vectors.
pub const T0: i64 = 1_736_870_400_000;

/// Principals and groups of the reference organization.
#[derive(Debug, Clone)]
pub struct Org {
    pub eng: GroupId,
    pub hr: GroupId,
    pub sales: GroupId,

    /// Eng user.
    pub alice: Principal,
    /// HR user.
    pub bob: Principal,
    /// Sales user.
    pub carol: Principal,
    /// Second Eng user.
    pub dave: Principal,

    /// Admin, member of Eng.
    pub admin: Principal,
    pub hr_manager: Principal,
    pub sales_manager: Principal,
}

impl Org {
    /// Look a fixture principal up by first name, case-insensitively.
    pub fn by_name(&self, name: &str) -> Option<&Principal> {
        self.all()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Every fixture principal, ordered by id.
    pub fn all(&self) -> Vec<&Principal> {
        let mut all = vec![
            &self.alice,
            &self.bob,
            &self.carol,
            &self.dave,
            &self.admin,
            &self.hr_manager,
            &self.sales_manager,
        ];
        all.sort_by_key(|p| p.id);
        all
    }
}

/// Register the reference organization in `directory`. No rules are created.
pub async fn seed_org<D: Directory + ?Sized>(directory: &D) -> Result<Org> {
    let eng = directory.insert_group("Eng").await?.id;
    let hr = directory.insert_group("HR").await?.id;
    let sales = directory.insert_group("Sales").await?.id;

    let add = |name: &str, group: GroupId, role: Role| {
        let email = format!("{}@example.com", name.to_lowercase());
        NewPrincipal::new(name, email, group, role)
    };

    Ok(Org {
        alice: directory.insert_principal(add("Alice", eng, Role::User)).await?,
        bob: directory.insert_principal(add("Bob", hr, Role::User)).await?,
        carol: directory.insert_principal(add("Carol", sales, Role::User)).await?,
        dave: directory.insert_principal(add("Dave", eng, Role::User)).await?,
        admin: directory.insert_principal(add("Admin", eng, Role::Admin)).await?,
        hr_manager: directory.insert_principal(add("Hana", hr, Role::Manager)).await?,
        sales_manager: directory
            .insert_principal(add("Sam", sales, Role::Manager))
            .await?,
        eng,
        hr,
        sales,
    })
}

/// The reference organization on a fresh in-memory store.
pub async fn memory_org() -> Result<(MemoryStore, Org)> {
    let store = MemoryStore::new();
    let org = seed_org(&store).await?;
    Ok((store, org))
}

/// Rules created by [`seed_scenario`].
#[derive(Debug, Clone, Copy)]
pub struct ScenarioRules {
    /// Permanent Eng-HR link.
    pub eng_hr: RuleId,
    /// Bob's approved, user-specific access to Sales (target Carol), 24h.
    pub bob_to_sales: RuleId,
}

/// Seed the reference rules on top of an organization, as of [`T0`].
pub async fn seed_scenario<S>(store: &S, org: &Org) -> Result<ScenarioRules>
where
    S: RuleStore + ?Sized,
{
    let eng_hr = store
        .insert_rule(NewRule::permanent(
            org.eng,
            org.hr,
            org.admin.id,
            "shared payroll",
            T0,
        ))
        .await?
        .id;

    let request = store
        .insert_rule(NewRule::temporary(
            org.bob.id,
            org.hr,
            org.sales,
            Some(org.carol.id),
            "contract review",
            Some(T0 + 24 * HOUR_MS),
            T0,
        ))
        .await?;
    store
        .decide_rule(
            request.id,
            &RuleDecision::approve(org.sales_manager.id, Some("ok".into()), T0),
        )
        .await?;

    Ok(ScenarioRules {
        eng_hr,
        bob_to_sales: request.id,
    })
}
