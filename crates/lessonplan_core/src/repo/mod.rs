//! Generic repository over a `TableSchema`.
//!
//! # Responsibility
//! - Orchestrate identity registry checks, cached statements and execution.
//! - Surface registry conflicts and data-access failures as distinct errors.
//!
//! # Invariants
//! - Every write either updates both the registry and the table, or neither.
//! - Registry misses are reported as `NotFound` before any SQL runs.

pub mod config;
pub mod error;
pub mod repository;
