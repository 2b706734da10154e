//! Per-repository prepared statement cache.

use super::{build_sql, Operation};
use crate::repo::error::ConfigError;
use crate::schema::TableSchema;
use log::debug;
use rusqlite::{Connection, Statement};

struct CachedStatement<'conn> {
    sql: String,
    statement: Statement<'conn>,
}

/// One prepared statement per `Operation`, bound to a single connection.
pub struct StatementCache<'conn> {
    slots: Vec<CachedStatement<'conn>>,
}

impl<'conn> StatementCache<'conn> {
    /// Prepares every operation for `schema`.
    ///
    /// # Errors
    /// - `ConfigError::Prepare` naming the first operation that failed.
    pub fn build<T>(conn: &'conn Connection, schema: &TableSchema<T>) -> Result<Self, ConfigError> {
        let mut slots = Vec::with_capacity(Operation::ALL.len());
        for operation in Operation::ALL {
            let sql = build_sql(schema, operation);
            let statement = conn
                .prepare(&sql)
                .map_err(|source| ConfigError::Prepare { operation, source })?;
            slots.push(CachedStatement { sql, statement });
        }

        debug!(
            "event=statement_cache_built module=statement status=ok table={} statements={}",
            schema.table_name,
            slots.len()
        );
        Ok(Self { slots })
    }

    /// Returns the prepared handle for `operation`.
    pub fn get(&mut self, operation: Operation) -> &mut Statement<'conn> {
        &mut self.slots[operation.slot()].statement
    }

    /// Returns the SQL text cached for `operation`.
    pub fn sql(&self, operation: Operation) -> &str {
        &self.slots[operation.slot()].sql
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
