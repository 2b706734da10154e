//! Generic CRUD repository.
//!
//! # Responsibility
//! - Map one entity type to one table through a `TableSchema`.
//! - Keep the shared `IdentityRegistry` consistent with the table.
//!
//! # Invariants
//! - Statements are prepared once in the constructor and reused afterwards.
//! - Transient entities are INSERTed and receive the database rowid; entities
//!   with an identifier are UPDATEd and never INSERTed.
//! - Writes run inside a savepoint; the registry is mutated last and restored
//!   if the savepoint cannot be released.
//! - Calls take `&mut self`: one repository is used by one caller at a time.

use crate::exec::{self, Deadline, Savepoint};
use crate::model::entity::{EntityId, EntityState, Persistable};
use crate::registry::{IdentityRegistry, RegistryError};
use crate::repo::config::RepositoryConfig;
use crate::repo::error::{ConfigError, RepoError, RepoResult};
use crate::schema::TableSchema;
use crate::statement::{Operation, StatementCache};
use log::{debug, error, info, warn};
use rusqlite::{Connection, InterruptHandle, Statement};
use std::sync::Arc;
use std::time::Instant;

/// Result of a successful `save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(EntityId),
    Updated(EntityId),
}

impl SaveOutcome {
    pub fn id(self) -> EntityId {
        match self {
            Self::Inserted(id) | Self::Updated(id) => id,
        }
    }
}

/// SQLite-backed repository for entity type `T`.
pub struct Repository<'conn, T: Persistable> {
    conn: &'conn Connection,
    schema: TableSchema<T>,
    registry: Arc<IdentityRegistry>,
    statements: StatementCache<'conn>,
    config: RepositoryConfig,
}

impl<'conn, T: Persistable> Repository<'conn, T> {
    /// Creates a blocking repository; see `with_config`.
    pub fn new(
        conn: &'conn Connection,
        schema: TableSchema<T>,
        registry: Arc<IdentityRegistry>,
    ) -> RepoResult<Self> {
        Self::with_config(conn, schema, registry, RepositoryConfig::default())
    }

    /// Validates the schema against the live table and prepares all statements.
    ///
    /// # Errors
    /// - `RepoError::Config` when the schema is malformed, the table or one of
    ///   its mapped columns is missing, or a statement fails to prepare.
    pub fn with_config(
        conn: &'conn Connection,
        schema: TableSchema<T>,
        registry: Arc<IdentityRegistry>,
        config: RepositoryConfig,
    ) -> RepoResult<Self> {
        let started_at = Instant::now();
        match prepare_statements(conn, &schema) {
            Ok(statements) => {
                info!(
                    "event=repo_init module=repo status=ok table={} duration_ms={} timeout_ms={:?}",
                    schema.table_name,
                    started_at.elapsed().as_millis(),
                    config.statement_timeout_ms
                );
                Ok(Self {
                    conn,
                    schema,
                    registry,
                    statements,
                    config,
                })
            }
            Err(err) => {
                error!(
                    "event=repo_init module=repo status=error table={} error={}",
                    schema.table_name, err
                );
                Err(err.into())
            }
        }
    }

    pub fn schema(&self) -> &TableSchema<T> {
        &self.schema
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    /// SQL text prepared for `operation`.
    pub fn sql(&self, operation: Operation) -> &str {
        self.statements.sql(operation)
    }

    /// Handle that aborts the statement currently running on this
    /// repository's connection; safe to use from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    pub fn state_of(&self, entity: &T) -> EntityState {
        match entity.id() {
            None => EntityState::Transient,
            Some(id) if self.registry.contains::<T>(id) => EntityState::Persistent,
            Some(_) => EntityState::Removed,
        }
    }

    /// Returns every row ordered by identifier.
    pub fn find_all(&mut self) -> RepoResult<Vec<T>> {
        let decode = self.schema.decode_row;
        let entities = self.run(Operation::FindAll, |statement| {
            exec::query_all(statement, &[], decode)
        })?;
        debug!(
            "event=repo_find_all module=repo status=ok table={} rows={}",
            self.schema.table_name,
            entities.len()
        );
        Ok(entities)
    }

    /// Loads one tracked entity.
    ///
    /// # Errors
    /// - `NotFound` when the registry does not track `id`; no SQL runs.
    /// - `MissingRow` when the registry tracks `id` but the table has no row.
    pub fn find_by_id(&mut self, id: EntityId) -> RepoResult<T> {
        if !self.registry.contains::<T>(id) {
            return Err(self.not_found(id));
        }

        let decode = self.schema.decode_row;
        let params = exec::id_params(id);
        let found = self.run(Operation::FindById, |statement| {
            exec::query_one(statement, &params, decode)
        })?;

        found.ok_or_else(|| self.divergence(Operation::FindById, id))
    }

    /// Inserts a transient entity or updates a persistent one.
    ///
    /// On insert the database rowid is written back into `entity` only after
    /// both the row and the registry entry exist.
    ///
    /// # Errors
    /// - `AlreadyTracked` when the new rowid is already tracked; the inserted
    ///   row is rolled back.
    /// - `NotFound` when `entity` carries an id the registry does not track
    ///   (removed, or never loaded through `attach_all`); no SQL runs.
    /// - `MissingRow` when an UPDATE matched no row; the registry is untouched.
    /// - `DataAccess` / `TimedOut` / `Interrupted` for execution failures.
    /// - `TransactionRolledBack` when an interrupted write inside a caller
    ///   transaction made SQLite roll that whole transaction back.
    pub fn save(&mut self, entity: &mut T) -> RepoResult<SaveOutcome> {
        let result = match entity.id() {
            None => self.insert(entity),
            Some(id) => self.update(entity, id),
        };

        match &result {
            Ok(outcome) => info!(
                "event=repo_save module=repo status=ok table={} outcome={:?}",
                self.schema.table_name, outcome
            ),
            Err(err) => warn!(
                "event=repo_save module=repo status=error table={} error_code={} error={}",
                self.schema.table_name,
                err.code(),
                err
            ),
        }
        result
    }

    /// Deletes a persistent entity.
    ///
    /// # Errors
    /// - `Transient` when `entity` has no identifier.
    /// - Otherwise as `delete_by_id`.
    pub fn delete(&mut self, entity: &T) -> RepoResult<()> {
        match entity.id() {
            Some(id) => self.delete_by_id(id),
            None => Err(RepoError::Transient {
                entity: self.schema.table_name,
            }),
        }
    }

    /// Deletes the row and registry entry for `id`.
    ///
    /// # Errors
    /// - `NotFound` when the registry does not track `id`; DELETE never runs.
    /// - `MissingRow` when the DELETE matched no row; the registry is untouched.
    pub fn delete_by_id(&mut self, id: EntityId) -> RepoResult<()> {
        let result = self.remove(id);
        match &result {
            Ok(()) => info!(
                "event=repo_delete module=repo status=ok table={} id={}",
                self.schema.table_name, id
            ),
            Err(err) => warn!(
                "event=repo_delete module=repo status=error table={} id={} error_code={} error={}",
                self.schema.table_name,
                id,
                err.code(),
                err
            ),
        }
        result
    }

    /// Tracks every existing row, replacing stale registry copies.
    ///
    /// Rows written before this process started are otherwise unknown to the
    /// registry and therefore unreachable through `find_by_id`/`delete`.
    pub fn attach_all(&mut self) -> RepoResult<usize> {
        let entities = self.find_all()?;
        for entity in &entities {
            self.registry
                .force_add(entity)
                .map_err(|err| self.registry_error(err))?;
        }
        Ok(entities.len())
    }

    fn insert(&mut self, entity: &mut T) -> RepoResult<SaveOutcome> {
        let operation = Operation::Insert;
        let params = exec::insert_params(&self.schema, entity);
        let in_caller_tx = !self.conn.is_autocommit();

        let savepoint =
            Savepoint::begin(self.conn).map_err(|source| self.data_access(operation, source))?;
        self.run(operation, |statement| {
            exec::execute_mutation(statement, &params)
        })
        .map_err(|err| self.check_caller_tx(in_caller_tx, operation, err))?;

        let id = self.conn.last_insert_rowid();
        let mut tracked = entity.clone();
        tracked.set_id(Some(id));
        self.registry
            .add(&tracked)
            .map_err(|err| self.registry_error(err))?;

        if let Err(source) = savepoint.release() {
            // The insert was rolled back, so the entry added above is orphaned.
            self.registry.delete_by_id::<T>(id).ok();
            return Err(self.data_access(operation, source));
        }

        entity.set_id(Some(id));
        Ok(SaveOutcome::Inserted(id))
    }

    fn update(&mut self, entity: &T, id: EntityId) -> RepoResult<SaveOutcome> {
        // Rowids of deleted rows are reused, so an untracked id may now
        // belong to a different entity.
        if !self.registry.contains::<T>(id) {
            return Err(self.not_found(id));
        }

        let operation = Operation::Update;
        let params = exec::update_params(&self.schema, entity, id);
        let in_caller_tx = !self.conn.is_autocommit();
        let changed = self
            .run(operation, |statement| {
                exec::execute_mutation(statement, &params)
            })
            .map_err(|err| self.check_caller_tx(in_caller_tx, operation, err))?;
        if changed == 0 {
            return Err(self.divergence(operation, id));
        }

        self.registry
            .force_add(entity)
            .map_err(|err| self.registry_error(err))?;
        Ok(SaveOutcome::Updated(id))
    }

    fn remove(&mut self, id: EntityId) -> RepoResult<()> {
        if !self.registry.contains::<T>(id) {
            return Err(self.not_found(id));
        }

        let operation = Operation::Delete;
        let params = exec::id_params(id);
        let in_caller_tx = !self.conn.is_autocommit();
        let savepoint =
            Savepoint::begin(self.conn).map_err(|source| self.data_access(operation, source))?;
        let changed = self
            .run(operation, |statement| {
                exec::execute_mutation(statement, &params)
            })
            .map_err(|err| self.check_caller_tx(in_caller_tx, operation, err))?;
        if changed == 0 {
            return Err(self.divergence(operation, id));
        }

        let removed = self
            .registry
            .delete_by_id::<T>(id)
            .map_err(|err| self.registry_error(err))?;

        if let Err(source) = savepoint.release() {
            // The row is back after rollback; track it again.
            self.registry.force_add(&removed).ok();
            return Err(self.data_access(operation, source));
        }
        Ok(())
    }

    /// Executes one cached statement under the configured deadline.
    fn run<R>(
        &mut self,
        operation: Operation,
        call: impl FnOnce(&mut Statement<'conn>) -> rusqlite::Result<R>,
    ) -> RepoResult<R> {
        let deadline = Deadline::start(self.conn, self.config.statement_timeout());
        let result = call(self.statements.get(operation));
        result.map_err(|source| {
            let entity = self.schema.table_name;
            if !exec::is_interrupted(&source) {
                RepoError::DataAccess {
                    operation,
                    entity,
                    source,
                }
            } else if deadline.expired() {
                RepoError::TimedOut { operation, entity }
            } else {
                RepoError::Interrupted { operation, entity }
            }
        })
    }

    /// SQLite rolls back the whole enclosing transaction when a write inside
    /// it is interrupted; report that instead of the bare interruption.
    fn check_caller_tx(
        &self,
        in_caller_tx: bool,
        operation: Operation,
        err: RepoError,
    ) -> RepoError {
        if in_caller_tx && self.conn.is_autocommit() {
            error!(
                "event=caller_tx_rolled_back module=repo status=error table={} operation={} error_code={}",
                self.schema.table_name,
                operation,
                err.code()
            );
            RepoError::TransactionRolledBack {
                operation,
                entity: self.schema.table_name,
            }
        } else {
            err
        }
    }

    fn data_access(&self, operation: Operation, source: rusqlite::Error) -> RepoError {
        RepoError::DataAccess {
            operation,
            entity: self.schema.table_name,
            source,
        }
    }

    fn not_found(&self, id: EntityId) -> RepoError {
        RepoError::NotFound {
            entity: self.schema.table_name,
            id,
        }
    }

    fn missing_row(&self, operation: Operation, id: EntityId) -> RepoError {
        RepoError::MissingRow {
            operation,
            entity: self.schema.table_name,
            id,
        }
    }

    /// Registry tracks `id` but the table has no such row.
    fn divergence(&self, operation: Operation, id: EntityId) -> RepoError {
        warn!(
            "event=registry_divergence module=repo status=error table={} operation={} id={}",
            self.schema.table_name, operation, id
        );
        self.missing_row(operation, id)
    }

    fn registry_error(&self, err: RegistryError) -> RepoError {
        let entity = self.schema.table_name;
        match err {
            RegistryError::AlreadyTracked { id, .. } => RepoError::AlreadyTracked { entity, id },
            RegistryError::NotFound { id, .. } => RepoError::NotFound { entity, id },
            RegistryError::MissingIdentifier { .. } => RepoError::Transient { entity },
        }
    }
}

fn prepare_statements<'conn, T>(
    conn: &'conn Connection,
    schema: &TableSchema<T>,
) -> Result<StatementCache<'conn>, ConfigError> {
    schema.validate()?;
    check_table(conn, schema)?;
    StatementCache::build(conn, schema)
}

fn check_table<T>(conn: &Connection, schema: &TableSchema<T>) -> Result<(), ConfigError> {
    let mut statement = conn
        .prepare("SELECT name, type, pk FROM pragma_table_info(?1);")
        .map_err(ConfigError::Inspect)?;
    let columns = statement
        .query_map([schema.table_name], |row| {
            Ok(TableColumn {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                pk: row.get(2)?,
            })
        })
        .map_err(ConfigError::Inspect)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(ConfigError::Inspect)?;

    if columns.is_empty() {
        return Err(ConfigError::MissingTable(schema.table_name.to_string()));
    }

    for column in schema.all_columns() {
        if !columns.iter().any(|info| info.name.eq_ignore_ascii_case(column)) {
            return Err(ConfigError::MissingColumn {
                table: schema.table_name.to_string(),
                column: column.to_string(),
            });
        }
    }

    check_rowid_alias(schema, &columns)?;

    let without_rowid: bool = conn
        .query_row(
            "SELECT COALESCE(MAX(wr), 0) FROM pragma_table_list WHERE name = ?1 COLLATE NOCASE;",
            [schema.table_name],
            |row| row.get(0),
        )
        .map_err(ConfigError::Inspect)?;
    if without_rowid {
        return Err(ConfigError::IdNotRowidAlias {
            table: schema.table_name.to_string(),
            column: schema.id_column.to_string(),
            reason: "table is WITHOUT ROWID",
        });
    }
    Ok(())
}

struct TableColumn {
    name: String,
    declared_type: String,
    pk: i64,
}

/// Ids come from `last_insert_rowid`, which only equals the id column when
/// that column is the table's `INTEGER PRIMARY KEY`.
fn check_rowid_alias<T>(
    schema: &TableSchema<T>,
    columns: &[TableColumn],
) -> Result<(), ConfigError> {
    let rejected = |reason| ConfigError::IdNotRowidAlias {
        table: schema.table_name.to_string(),
        column: schema.id_column.to_string(),
        reason,
    };

    let id = columns
        .iter()
        .find(|info| info.name.eq_ignore_ascii_case(schema.id_column))
        .ok_or_else(|| rejected("column not found"))?;
    if id.pk != 1 {
        return Err(rejected("not part of the primary key"));
    }
    if columns.iter().filter(|info| info.pk > 0).count() != 1 {
        return Err(rejected("primary key spans several columns"));
    }
    if !id.declared_type.eq_ignore_ascii_case("INTEGER") {
        return Err(rejected("declared type is not INTEGER"));
    }
    Ok(())
}
