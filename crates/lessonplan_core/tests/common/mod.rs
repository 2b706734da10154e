#![allow(dead_code)]

use lessonplan_core::db::open_db_in_memory;
use lessonplan_core::{EntityId, IdentityRegistry, Persistable, TableSchema};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Option<EntityId>,
    pub name: String,
    pub age: i64,
}

impl Persistable for Person {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

pub fn person(name: &str, age: i64) -> Person {
    Person {
        id: None,
        name: name.to_string(),
        age,
    }
}

pub fn decode_person(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        age: row.get(2)?,
    })
}

pub fn encode_person(person: &Person) -> Vec<Value> {
    vec![Value::Text(person.name.clone()), Value::Integer(person.age)]
}

pub const PERSON_SCHEMA: TableSchema<Person> = TableSchema {
    table_name: "person",
    id_column: "id",
    other_columns: &["name", "age"],
    decode_row: decode_person,
    encode_columns: encode_person,
};

pub fn person_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE person (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn
}

pub fn shared_registry() -> Arc<IdentityRegistry> {
    Arc::new(IdentityRegistry::new())
}

pub fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM person;", [], |row| row.get(0))
        .unwrap()
}

pub fn raw_person(conn: &Connection, id: EntityId) -> Option<(String, i64)> {
    let mut statement = conn
        .prepare("SELECT name, age FROM person WHERE id = ?1;")
        .unwrap();
    let mut rows = statement.query([id]).unwrap();
    rows.next()
        .unwrap()
        .map(|row| (row.get(0).unwrap(), row.get(1).unwrap()))
}
