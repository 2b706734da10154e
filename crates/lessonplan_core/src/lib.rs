//! Generic entity persistence for the lesson plan application.
//! Maps typed entities to SQLite rows and keeps an identity registry in step.

pub mod db;
pub mod exec;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod schema;
pub mod statement;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{EntityId, EntityState, Persistable};
pub use registry::{IdentityRegistry, RegistryError, RegistryResult};
pub use repo::config::RepositoryConfig;
pub use repo::error::{ConfigError, RepoError, RepoResult};
pub use repo::repository::{Repository, SaveOutcome};
pub use schema::{ColumnEncoder, RowDecoder, SchemaError, TableSchema};
pub use statement::{build_sql, Operation, StatementCache};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
