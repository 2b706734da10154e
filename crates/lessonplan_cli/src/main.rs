//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `lessonplan_core` wiring with one save/find/delete round trip.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `lessonplan_cli [db_path]` (in-memory when no path is given).

use lessonplan_core::db::{open_db, open_db_in_memory};
use lessonplan_core::{EntityId, IdentityRegistry, Persistable, Repository, TableSchema};
use rusqlite::types::Value;
use rusqlite::Row;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Room {
    id: Option<EntityId>,
    label: String,
    seats: i64,
}

impl Persistable for Room {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

fn decode_room(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: Some(row.get(0)?),
        label: row.get(1)?,
        seats: row.get(2)?,
    })
}

fn encode_room(room: &Room) -> Vec<Value> {
    vec![Value::Text(room.label.clone()), Value::Integer(room.seats)]
}

const ROOM_SCHEMA: TableSchema<Room> = TableSchema {
    table_name: "smoke_room",
    id_column: "id",
    other_columns: &["label", "seats"],
    decode_row: decode_room,
    encode_columns: encode_room,
};

fn main() -> ExitCode {
    println!("lessonplan_core version={}", lessonplan_core::core_version());
    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smoke check failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<String>) -> Result<(), Box<dyn Error>> {
    let conn = match db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS smoke_room (
            id INTEGER PRIMARY KEY,
            label TEXT NOT NULL,
            seats INTEGER NOT NULL
        );",
    )?;

    let registry = Arc::new(IdentityRegistry::new());
    let mut rooms = Repository::new(&conn, ROOM_SCHEMA, registry)?;

    let mut room = Room {
        id: None,
        label: "A101".to_string(),
        seats: 28,
    };
    let id = rooms.save(&mut room)?.id();
    let loaded = rooms.find_by_id(id)?;
    println!(
        "smoke save id={} label={} seats={}",
        id, loaded.label, loaded.seats
    );

    rooms.delete(&room)?;
    println!("smoke delete id={id} remaining={}", rooms.find_all()?.len());
    Ok(())
}
