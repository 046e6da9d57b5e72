//! # Commgate Testkit
//!
//! Testing utilities for Commgate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: The reference Eng/HR/Sales organization and its rules
//! - **Generators**: Proptest strategies for random organizations and rule sets
//! - **Golden vectors**: Expected decisions over the reference scenario, exportable as JSON
//!
//! ## Golden Vectors
//!
//! ```rust,no_run
//! use commgate_testkit::fixtures::{memory_org, seed_scenario};
//! use commgate_testkit::vectors::{all_vectors, verify_vectors};
//!
//! async fn check() {
//!     let (store, org) = memory_org().await.unwrap();
//!     seed_scenario(&store, &org).await.unwrap();
//!     for result in verify_vectors(&store, &org, &all_vectors()).await {
//!         println!("{}: {}", result.name, result.actual);
//!     }
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use commgate_testkit::generators::{seed_params, OrgParams};
//!
//! proptest! {
//!     #[test]
//!     fn seeded_orgs_have_every_group(params: OrgParams) {
//!         // seed into a store, then check invariants
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{memory_org, seed_org, seed_scenario, Org, ScenarioRules, T0};
pub use generators::{seed_params, OrgParams, RuleSpec, SeededOrg, EVAL_AT};
pub use vectors::{all_vectors, verify_vectors, GoldenVector, VectorResult};
