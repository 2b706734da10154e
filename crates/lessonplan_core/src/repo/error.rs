//! Repository error taxonomy.

use crate::model::entity::EntityId;
use crate::schema::SchemaError;
use crate::statement::Operation;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Fatal construction-time failures; the repository is unusable.
#[derive(Debug)]
pub enum ConfigError {
    Schema(SchemaError),
    MissingTable(String),
    MissingColumn { table: String, column: String },
    Inspect(rusqlite::Error),
    IdNotRowidAlias {
        table: String,
        column: String,
        reason: &'static str,
    },
    Prepare {
        operation: Operation,
        source: rusqlite::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::MissingTable(table) => write!(f, "table `{table}` does not exist"),
            Self::MissingColumn { table, column } => {
                write!(f, "table `{table}` has no column `{column}`")
            }
            Self::Inspect(err) => write!(f, "failed to inspect connection: {err}"),
            Self::IdNotRowidAlias {
                table,
                column,
                reason,
            } => write!(
                f,
                "identifier column `{table}.{column}` must be the rowid alias (INTEGER PRIMARY KEY): {reason}"
            ),
            Self::Prepare { operation, source } => {
                write!(f, "failed to prepare {operation} statement: {source}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Inspect(err) => Some(err),
            Self::Prepare { source, .. } => Some(source),
            Self::MissingTable(_) | Self::MissingColumn { .. } | Self::IdNotRowidAlias { .. } => None,
        }
    }
}

impl From<SchemaError> for ConfigError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Error returned by every repository call.
///
/// Registry conflicts (`AlreadyTracked`, `NotFound`) and execution failures
/// (`DataAccess`, `TimedOut`, `Interrupted`, `TransactionRolledBack`,
/// `MissingRow`) never share a
/// variant, so callers can tell an identity conflict from a failed write.
#[derive(Debug)]
pub enum RepoError {
    Config(ConfigError),
    AlreadyTracked {
        entity: &'static str,
        id: EntityId,
    },
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    Transient {
        entity: &'static str,
    },
    MissingRow {
        operation: Operation,
        entity: &'static str,
        id: EntityId,
    },
    DataAccess {
        operation: Operation,
        entity: &'static str,
        source: rusqlite::Error,
    },
    TimedOut {
        operation: Operation,
        entity: &'static str,
    },
    Interrupted {
        operation: Operation,
        entity: &'static str,
    },
    TransactionRolledBack {
        operation: Operation,
        entity: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_tracked(&self) -> bool {
        matches!(self, Self::AlreadyTracked { .. })
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::AlreadyTracked { .. } => "already_tracked",
            Self::NotFound { .. } => "not_found",
            Self::Transient { .. } => "transient",
            Self::MissingRow { .. } => "missing_row",
            Self::DataAccess { .. } => "data_access",
            Self::TimedOut { .. } => "timed_out",
            Self::Interrupted { .. } => "interrupted",
            Self::TransactionRolledBack { .. } => "transaction_rolled_back",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "repository configuration error: {err}"),
            Self::AlreadyTracked { entity, id } => {
                write!(f, "{entity} with id {id} is already tracked")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} with id {id} not found"),
            Self::Transient { entity } => write!(f, "{entity} has not been saved yet"),
            Self::MissingRow {
                operation,
                entity,
                id,
            } => write!(f, "{operation} on {entity} id {id} matched no row"),
            Self::DataAccess {
                operation,
                entity,
                source,
            } => write!(f, "{operation} on {entity} failed: {source}"),
            Self::TimedOut { operation, entity } => {
                write!(f, "{operation} on {entity} exceeded the statement timeout")
            }
            Self::Interrupted { operation, entity } => {
                write!(f, "{operation} on {entity} was interrupted")
            }
            Self::TransactionRolledBack { operation, entity } => write!(
                f,
                "{operation} on {entity} was interrupted and the enclosing transaction was rolled back"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::DataAccess { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}
