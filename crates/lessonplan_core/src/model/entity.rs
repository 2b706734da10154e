//! Entity collaborator contract.
//!
//! # Responsibility
//! - Expose the nullable identifier used to pick INSERT vs UPDATE.
//!
//! # Invariants
//! - `id()` returns `None` until the repository assigns a database rowid.
//! - Concrete entity field layouts stay outside this crate; only the
//!   identifier accessor pair is required here.

use serde::{Deserialize, Serialize};

/// Database-assigned identifier (SQLite rowid).
pub type EntityId = i64;

/// Domain object that can be mapped to one table row.
///
/// Implementors must be cheap to clone: the identity registry keeps its own
/// tracked copy of every persistent instance.
pub trait Persistable: Clone + Send + 'static {
    /// Returns the identifier, or `None` when the entity is transient.
    fn id(&self) -> Option<EntityId>;

    /// Replaces the identifier.
    fn set_id(&mut self, id: Option<EntityId>);

    /// Returns whether the entity has not been persisted yet.
    fn is_transient(&self) -> bool {
        self.id().is_none()
    }
}

/// Lifecycle state of one entity as seen by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// No identifier yet; `save` will INSERT.
    Transient,
    /// Identifier present and tracked; `save` will UPDATE.
    Persistent,
    /// Identifier present but no longer tracked (deleted, or never loaded).
    Removed,
}
