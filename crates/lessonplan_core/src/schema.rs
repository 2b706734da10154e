//! Per-entity table metadata.
//!
//! # Responsibility
//! - Describe table/column names and the row codec for one entity type.
//! - Reject metadata that would produce ambiguous or unsafe SQL text.
//!
//! # Invariants
//! - `other_columns` never contains `id_column`.
//! - `decode_row` reads `id_column` at index 0, then `other_columns` in order.
//! - `encode_columns` yields exactly one value per entry of `other_columns`,
//!   in the same order.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SQL_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Decodes one projected row (`id, others...`) into an entity.
pub type RowDecoder<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

/// Encodes non-identifier column values in `other_columns` order.
pub type ColumnEncoder<T> = fn(&T) -> Vec<Value>;

/// Schema metadata rejected before any statement is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidIdentifier(String),
    NoColumns { table: String },
    IdColumnListed { table: String, column: String },
    DuplicateColumn { table: String, column: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => write!(f, "invalid SQL identifier `{value}`"),
            Self::NoColumns { table } => {
                write!(f, "schema for `{table}` declares no non-identifier columns")
            }
            Self::IdColumnListed { table, column } => write!(
                f,
                "schema for `{table}` lists identifier column `{column}` among other columns"
            ),
            Self::DuplicateColumn { table, column } => {
                write!(f, "schema for `{table}` lists column `{column}` twice")
            }
        }
    }
}

impl Error for SchemaError {}

/// Table mapping for entity type `T`.
pub struct TableSchema<T> {
    pub table_name: &'static str,
    pub id_column: &'static str,
    pub other_columns: &'static [&'static str],
    pub decode_row: RowDecoder<T>,
    pub encode_columns: ColumnEncoder<T>,
}

// Manual impls: deriving would require `T: Clone`/`T: Debug`.
impl<T> Clone for TableSchema<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableSchema<T> {}

impl<T> std::fmt::Debug for TableSchema<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("table_name", &self.table_name)
            .field("id_column", &self.id_column)
            .field("other_columns", &self.other_columns)
            .finish_non_exhaustive()
    }
}

impl<T> TableSchema<T> {
    /// Checks identifiers and column layout.
    ///
    /// # Errors
    /// - `InvalidIdentifier` when a table/column name is not a plain SQL
    ///   identifier (names are spliced into SQL text unquoted).
    /// - `NoColumns` when `other_columns` is empty.
    /// - `IdColumnListed` / `DuplicateColumn` for ambiguous positional layouts.
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_identifier(self.table_name)?;
        check_identifier(self.id_column)?;

        if self.other_columns.is_empty() {
            return Err(SchemaError::NoColumns {
                table: self.table_name.to_string(),
            });
        }

        for (index, column) in self.other_columns.iter().enumerate() {
            check_identifier(column)?;
            if column.eq_ignore_ascii_case(self.id_column) {
                return Err(SchemaError::IdColumnListed {
                    table: self.table_name.to_string(),
                    column: column.to_string(),
                });
            }
            if self.other_columns[..index]
                .iter()
                .any(|earlier| earlier.eq_ignore_ascii_case(column))
            {
                return Err(SchemaError::DuplicateColumn {
                    table: self.table_name.to_string(),
                    column: column.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns `id, other1, other2, ...`.
    pub fn column_list(&self) -> String {
        std::iter::once(self.id_column)
            .chain(self.other_columns.iter().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns every mapped column, identifier first.
    pub fn all_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.id_column).chain(self.other_columns.iter().copied())
    }
}

fn check_identifier(value: &str) -> Result<(), SchemaError> {
    if SQL_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(value.to_string()))
    }
}
