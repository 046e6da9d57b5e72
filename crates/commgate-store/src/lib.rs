//! # Commgate Store
//!
//! Storage abstraction for Commgate. Provides trait-based interfaces for the
//! principal directory, communication rules, and the message log, with SQLite
//! and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Directory`] - Group and principal lookups
//! - [`RuleStore`] - Rule queries and atomic rule mutations
//! - [`MessageLog`] - Append-only record of send attempts
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use commgate_store::{Directory, RuleStore, SqliteStore};
//! use commgate_core::{NewRule, PrincipalId};
//!
//! async fn example() {
//!     let store = SqliteStore::open("commgate.db").unwrap();
//!
//!     let eng = store.insert_group("Eng").await.unwrap();
//!     let hr = store.insert_group("HR").await.unwrap();
//!
//!     let rule = NewRule::permanent(eng.id, hr.id, PrincipalId(1), "shared payroll", 0);
//!     store.insert_rule(rule).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No rule cache**: every call reads current rows, which is also how lazy expiry works
//! - **Atomic mutations**: duplicate-permanent checks and decisions are single transactions
//! - **Unordered pairs**: rules are indexed by the normalized `(lo, hi)` group pair

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Directory, MessageLog, RuleQuery, RuleStore, Store};
