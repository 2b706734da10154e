//! SQL text generation.

use super::Operation;
use crate::schema::TableSchema;

/// Builds the SQL text for one operation.
///
/// Assumes `schema.validate()` already passed; names are spliced unquoted.
pub fn build_sql<T>(schema: &TableSchema<T>, operation: Operation) -> String {
    let table = schema.table_name;
    let id = schema.id_column;
    match operation {
        Operation::FindAll => format!(
            "SELECT {columns} FROM {table} ORDER BY {id}",
            columns = schema.column_list()
        ),
        Operation::FindById => format!(
            "SELECT {columns} FROM {table} WHERE {id} = ?1",
            columns = schema.column_list()
        ),
        Operation::Insert => format!(
            "INSERT INTO {table} ({columns}) VALUES ({placeholders})",
            columns = schema.other_columns.join(", "),
            placeholders = placeholders(schema.other_columns.len())
        ),
        Operation::Update => {
            let assignments = schema
                .other_columns
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{column} = ?{}", index + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "UPDATE {table} SET {assignments} WHERE {id} = ?{}",
                schema.other_columns.len() + 1
            )
        }
        Operation::Delete => format!("DELETE FROM {table} WHERE {id} = ?1"),
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
