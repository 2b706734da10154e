//! Repository runtime options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-repository execution options.
///
/// The default keeps every call blocking until SQLite returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Interrupt a single statement after this many milliseconds.
    pub statement_timeout_ms: Option<u64>,
}

impl RepositoryConfig {
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}
