//! Parameterized CRUD statements derived from a `TableSchema`.
//!
//! # Responsibility
//! - Generate the five CRUD SQL texts (pure, no connection needed).
//! - Prepare them once per repository and hand out cached handles.
//!
//! # Invariants
//! - Positional placeholders follow `other_columns` order; the identifier is
//!   always the last parameter of UPDATE and the only one of FIND_BY_ID/DELETE.
//! - A built cache never re-prepares SQL.

mod cache;
mod sql;

pub use cache::StatementCache;
pub use sql::build_sql;

use std::fmt::{Display, Formatter};

/// Logical CRUD operation backed by one cached statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FindAll,
    FindById,
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Every operation, in cache slot order.
    pub const ALL: [Operation; 5] = [
        Operation::FindAll,
        Operation::FindById,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
    ];

    /// Stable name used in log events and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::FindAll => "find_all",
            Self::FindById => "find_by_id",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
