//! Golden decision vectors.
//!
//! Each vector names a sender and receiver from the reference organization,
//! an offset from [`T0`], and the expected decision once
//! [`seed_scenario`](crate::fixtures::seed_scenario) has run. Vectors are
//! plain serde types so they can be exported as JSON and checked by other
//! implementations of the same rules.

use commgate_core::HOUR_MS;
use commgate_policy::Evaluator;
use commgate_store::{Directory, RuleStore};
use serde::{Deserialize, Serialize};

use crate::fixtures::{Org, T0};

/// A golden decision vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// Sender's fixture name.
    pub sender: String,
    /// Receiver's fixture name.
    pub receiver: String,
    /// Milliseconds after `T0` at which to evaluate.
    pub offset_ms: i64,
    pub allowed: bool,
    pub reason: String,
}

impl GoldenVector {
    fn new(
        name: &str,
        sender: &str,
        receiver: &str,
        offset_ms: i64,
        allowed: bool,
        reason: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            offset_ms,
            allowed,
            reason: reason.to_string(),
        }
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    let hour = HOUR_MS;
    vec![
        GoldenVector::new("same group", "Alice", "Dave", hour, true, "same group"),
        GoldenVector::new("permanent forward", "Alice", "Bob", hour, true, "permanent rule"),
        GoldenVector::new("permanent backward", "Bob", "Alice", hour, true, "permanent rule"),
        GoldenVector::new(
            "no link to sales",
            "Alice",
            "Carol",
            hour,
            false,
            "no communication rule found",
        ),
        GoldenVector::new(
            "user-specific requester",
            "Bob",
            "Carol",
            hour,
            true,
            "temporary rule",
        ),
        GoldenVector::new(
            "user-specific reaches whole target group",
            "Bob",
            "Sam",
            hour,
            true,
            "temporary rule",
        ),
        GoldenVector::new(
            "user-specific other sender",
            "Hana",
            "Carol",
            hour,
            false,
            "temporary rule is user-specific and does not match sender",
        ),
        GoldenVector::new(
            "user-specific reverse direction",
            "Carol",
            "Bob",
            hour,
            false,
            "temporary rule is user-specific and does not match sender",
        ),
        GoldenVector::new(
            "last millisecond before expiry",
            "Bob",
            "Carol",
            24 * hour - 1,
            true,
            "temporary rule",
        ),
        GoldenVector::new(
            "expired at boundary",
            "Bob",
            "Carol",
            24 * hour,
            false,
            "no communication rule found",
        ),
        GoldenVector::new(
            "permanent outlives temporary",
            "Dave",
            "Hana",
            48 * hour,
            true,
            "permanent rule",
        ),
    ]
}

/// Serialize vectors as pretty JSON.
pub fn to_json(vectors: &[GoldenVector]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(vectors)
}

/// Parse vectors from JSON.
pub fn from_json(json: &str) -> serde_json::Result<Vec<GoldenVector>> {
    serde_json::from_str(json)
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorResult {
    pub name: String,
    pub passed: bool,
    /// What the evaluator actually returned, or why it could not run.
    pub actual: String,
}

/// Check every vector against a store seeded with the reference scenario.
pub async fn verify_vectors<S>(store: &S, org: &Org, vectors: &[GoldenVector]) -> Vec<VectorResult>
where
    S: Directory + RuleStore + ?Sized,
{
    let evaluator = Evaluator::new(store, store);
    let mut results = Vec::with_capacity(vectors.len());

    for vector in vectors {
        let (Some(sender), Some(receiver)) = (org.by_name(&vector.sender), org.by_name(&vector.receiver))
        else {
            results.push(VectorResult {
                name: vector.name.clone(),
                passed: false,
                actual: format!("unknown principal in {} -> {}", vector.sender, vector.receiver),
            });
            continue;
        };

        let result = match evaluator
            .evaluate(sender.id, receiver.id, T0 + vector.offset_ms)
            .await
        {
            Ok(decision) => VectorResult {
                name: vector.name.clone(),
                passed: decision.allowed == vector.allowed
                    && decision.reason.as_str() == vector.reason,
                actual: format!("({}, {})", decision.allowed, decision.reason),
            },
            Err(e) => VectorResult {
                name: vector.name.clone(),
                passed: false,
                actual: e.to_string(),
            },
        };
        results.push(result);
    }

    results
}
