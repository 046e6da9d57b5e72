//! Strong type definitions for Commgate.
//!
//! All identifiers are newtypes over the storage row id so that a group id
//! can never be passed where a principal id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Identifier of an organizational group.
    GroupId,
    "GroupId"
);
row_id!(
    /// Identifier of an addressable principal.
    PrincipalId,
    "PrincipalId"
);
row_id!(
    /// Identifier of a communication rule.
    RuleId,
    "RuleId"
);
row_id!(
    /// Identifier of a message log entry.
    MessageId,
    "MessageId"
);

/// An unordered pair of distinct groups.
///
/// Stored normalized as `(lo, hi)` so that `{A, B}` and `{B, A}` compare
/// and hash identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupPair {
    lo: GroupId,
    hi: GroupId,
}

impl GroupPair {
    /// Build a pair from two groups in any order.
    ///
    /// Fails with [`CoreError::SelfPair`] when both ids are equal.
    pub fn new(a: GroupId, b: GroupId) -> Result<Self, CoreError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { lo: a, hi: b }),
            std::cmp::Ordering::Greater => Ok(Self { lo: b, hi: a }),
            std::cmp::Ordering::Equal => Err(CoreError::SelfPair(a)),
        }
    }

    /// The smaller group id.
    pub const fn lo(&self) -> GroupId {
        self.lo
    }

    /// The larger group id.
    pub const fn hi(&self) -> GroupId {
        self.hi
    }
}

/// Offset/limit paging for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of rows to skip.
    pub offset: u32,
    /// Maximum number of rows to return.
    pub limit: u32,
}

impl Page {
    /// Create a page.
    pub const fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// The first `limit` rows.
    pub const fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// Clamp the limit to `max`.
    pub fn clamped(self, max: u32) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.min(max),
        }
    }

    /// Apply the page to an already ordered iterator.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first(100)
    }
}
