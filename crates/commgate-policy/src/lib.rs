//! # Commgate Policy
//!
//! Decides who may message whom.
//!
//! ## Components
//!
//! - [`Evaluator`] - Per-pair decision: `(sender, receiver, now) -> Decision`
//! - [`Resolver`] - Everyone a sender may reach at `now`
//! - [`gates`] - Role checks around rule administration and messaging
//!
//! Both the evaluator and the resolver are read-only and generic over the
//! store traits, so they run against [`commgate_store::MemoryStore`] in tests
//! and [`commgate_store::SqliteStore`] in production. For a fixed `now` they
//! agree: a principal is in the communicable set exactly when a send to them
//! evaluates as allowed.

pub mod error;
pub mod evaluator;
pub mod gates;
pub mod resolver;

pub use error::{PolicyError, Result};
pub use evaluator::{decide, Decision, DecisionReason, Evaluator};
pub use gates::{authorize, authorize_decision, authorize_self, Operation};
pub use resolver::{reachable_groups, Resolver};
