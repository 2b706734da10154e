//! Entity contract shared by every persisted domain type.
//!
//! # Responsibility
//! - Define the identifier shape the persistence core relies on.
//! - Describe the transient/persistent/removed lifecycle.
//!
//! # Invariants
//! - An entity without identifier has never been persisted by this process.
//! - Identifiers are assigned by the database, never by callers.

pub mod entity;
