//! # Commgate
//!
//! Group-based communication authorization: decides whether a message may
//! pass between two principals right now, based on group membership and a set
//! of approvable, optionally expiring inter-group rules.
//!
//! ## Overview
//!
//! - **Same group**: members of one group may always message each other
//! - **Permanent rules**: admin-created links between two groups, both directions
//! - **Temporary rules**: requested by a principal, approved or rejected by a
//!   manager of either group or an admin, optionally expiring and optionally
//!   scoped to the requester alone
//!
//! ## Usage
//!
//! ```rust,no_run
//! use commgate::{Engine, EngineConfig, TemporaryRequest};
//! use commgate::store::{Directory, SqliteStore};
//! use commgate::core::{NewPrincipal, Role};
//!
//! async fn example() {
//!     let store = SqliteStore::open("commgate.db").unwrap();
//!     let eng = store.insert_group("Eng").await.unwrap();
//!     let hr = store.insert_group("HR").await.unwrap();
//!     let alice = store
//!         .insert_principal(NewPrincipal::new("Alice", "alice@example.com", eng.id, Role::User))
//!         .await
//!         .unwrap();
//!
//!     let engine = Engine::new(store, EngineConfig::default());
//!     let now = commgate::now_millis();
//!
//!     // Ask for a day of access to HR
//!     let request = TemporaryRequest::new(hr.id, "benefits review").expiry_hours(24);
//!     let _rule = engine.lifecycle().request_temporary(&alice, request, now).await.unwrap();
//!
//!     // Nothing passes until a manager or admin approves it
//!     let _reachable = engine.communicable(alice.id, now).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `commgate::core` - Data model (rules, principals, ids)
//! - `commgate::store` - Storage traits, SQLite and in-memory backends
//! - `commgate::policy` - Evaluator, resolver, and role gates

pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;

// Re-export component crates
pub use commgate_core as core;
pub use commgate_policy as policy;
pub use commgate_store as store;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::{now_millis, Engine, RecipientSearch};
pub use error::{EngineError, Result};
pub use lifecycle::{RuleLifecycle, TemporaryRequest};

pub use commgate_core::{
    CommunicationRule, DeliveryStatus, Group, GroupId, MessageRecord, Page, Principal,
    PrincipalId, Role, RuleId, RuleStatus, RuleType,
};
pub use commgate_policy::{Decision, DecisionReason, Operation};
