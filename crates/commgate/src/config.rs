//! Engine configuration.

use commgate_core::{expiry_after_hours, Page};

use crate::error::{EngineError, Result};

/// Configuration for the [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size used when a caller does not supply one.
    pub default_page_limit: u32,
    /// Upper bound on any requested page size.
    pub max_page_limit: u32,
    /// Longest temporary rule a requester may ask for. `None` is unbounded.
    pub max_expiry_hours: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 100,
            max_page_limit: 1000,
            max_expiry_hours: None,
        }
    }
}

impl EngineConfig {
    /// Resolve a caller-supplied page against the configured limits.
    pub fn page(&self, requested: Option<Page>) -> Page {
        requested
            .unwrap_or(Page::first(self.default_page_limit))
            .clamped(self.max_page_limit)
    }

    /// Turn a relative expiry into an absolute timestamp.
    ///
    /// `None` means the rule never expires.
    pub fn expiry(&self, now: i64, hours: Option<i64>) -> Result<Option<i64>> {
        let Some(hours) = hours else {
            return Ok(None);
        };

        if let Some(max) = self.max_expiry_hours {
            if hours > max {
                return Err(EngineError::InvalidArgument(format!(
                    "expiry_hours {} exceeds the maximum of {}",
                    hours, max
                )));
            }
        }

        Ok(Some(expiry_after_hours(now, hours)?))
    }
}
