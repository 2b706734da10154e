//! Statement execution: parameter binding, row decoding, guards.
//!
//! # Responsibility
//! - Bind positional parameters into cached statements and run them.
//! - Decode result rows through a `TableSchema` row decoder.
//! - Bound a single call by an optional deadline.
//! - Keep one repository write atomic with a savepoint.
//!
//! # Invariants
//! - Affected-row counts are returned as-is; callers decide what zero means.
//! - A `Deadline` guard always uninstalls its progress handler on drop.
//! - An unreleased `Savepoint` rolls back on drop, unless SQLite already
//!   rolled back the enclosing transaction.

use crate::model::entity::EntityId;
use crate::schema::{RowDecoder, TableSchema};
use log::error;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, Statement};
use std::time::{Duration, Instant};

/// SQLite VM instructions between deadline checks.
const PROGRESS_CHECK_INTERVAL: i32 = 1_000;
const WRITE_SAVEPOINT: &str = "lessonplan_write";

/// Runs a query and decodes every row, preserving result order.
pub fn query_all<T>(
    statement: &mut Statement<'_>,
    params: &[Value],
    decode: RowDecoder<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut rows = statement.query(params_from_iter(params))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(decode(row)?);
    }
    Ok(entities)
}

/// Runs a query expected to match at most one row.
pub fn query_one<T>(
    statement: &mut Statement<'_>,
    params: &[Value],
    decode: RowDecoder<T>,
) -> rusqlite::Result<Option<T>> {
    let mut rows = statement.query(params_from_iter(params))?;
    match rows.next()? {
        Some(row) => Ok(Some(decode(row)?)),
        None => Ok(None),
    }
}

/// Runs a mutation and returns the number of affected rows.
pub fn execute_mutation(statement: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<usize> {
    statement.execute(params_from_iter(params))
}

/// Parameters for FIND_BY_ID and DELETE.
pub fn id_params(id: EntityId) -> Vec<Value> {
    vec![Value::Integer(id)]
}

/// Parameters for INSERT: encoded non-identifier columns.
pub fn insert_params<T>(schema: &TableSchema<T>, entity: &T) -> Vec<Value> {
    (schema.encode_columns)(entity)
}

/// Parameters for UPDATE: encoded columns followed by the identifier.
pub fn update_params<T>(schema: &TableSchema<T>, entity: &T, id: EntityId) -> Vec<Value> {
    let mut params = (schema.encode_columns)(entity);
    params.push(Value::Integer(id));
    params
}

/// Returns whether SQLite aborted the statement through an interrupt.
pub fn is_interrupted(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}

/// Interrupts statements on `conn` once `timeout` elapses.
pub struct Deadline<'conn> {
    conn: &'conn Connection,
    expires_at: Option<Instant>,
}

impl<'conn> Deadline<'conn> {
    /// Installs the progress handler; `None` keeps the blocking contract.
    pub fn start(conn: &'conn Connection, timeout: Option<Duration>) -> Self {
        let expires_at = timeout.map(|timeout| Instant::now() + timeout);
        if let Some(expires_at) = expires_at {
            conn.progress_handler(
                PROGRESS_CHECK_INTERVAL,
                Some(move || Instant::now() >= expires_at),
            );
        }
        Self { conn, expires_at }
    }

    pub fn expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

impl Drop for Deadline<'_> {
    fn drop(&mut self) {
        if self.expires_at.is_some() {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}

/// Named savepoint scoped to one repository write.
///
/// Nests inside any transaction the caller already opened.
pub struct Savepoint<'conn> {
    conn: &'conn Connection,
    released: bool,
}

impl<'conn> Savepoint<'conn> {
    pub fn begin(conn: &'conn Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(&format!("SAVEPOINT {WRITE_SAVEPOINT};"))?;
        Ok(Self {
            conn,
            released: false,
        })
    }

    /// Makes the writes since `begin` part of the enclosing scope.
    pub fn release(mut self) -> rusqlite::Result<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {WRITE_SAVEPOINT};"))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        // An interrupted write makes SQLite roll back the whole transaction,
        // savepoint included; there is nothing left to roll back.
        if self.released || self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {WRITE_SAVEPOINT}; RELEASE SAVEPOINT {WRITE_SAVEPOINT};"
        )) {
            error!(
                "event=savepoint_rollback module=exec status=error error={}",
                err
            );
        }
    }
}
