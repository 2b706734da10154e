mod common;

use common::{person, person_db, raw_person, row_count, shared_registry, Person, PERSON_SCHEMA};
use lessonplan_core::{EntityState, Operation, RepoError, Repository, SaveOutcome};

#[test]
fn save_transient_inserts_and_find_by_id_roundtrips() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    let mut ana = person("Ana", 30);
    let outcome = repo.save(&mut ana).unwrap();

    let id = match outcome {
        SaveOutcome::Inserted(id) => id,
        other => panic!("expected insert, got {other:?}"),
    };
    assert_eq!(ana.id, Some(id));
    assert!(registry.contains::<Person>(id));
    assert_eq!(raw_person(&conn, id), Some(("Ana".to_string(), 30)));

    let loaded = repo.find_by_id(id).unwrap();
    assert_eq!(
        loaded,
        Person {
            id: Some(id),
            name: "Ana".to_string(),
            age: 30,
        }
    );
}

#[test]
fn save_persistent_updates_without_second_registry_entry() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    let mut ana = person("Ana", 30);
    let id = repo.save(&mut ana).unwrap().id();

    ana.age = 31;
    assert_eq!(repo.save(&mut ana).unwrap(), SaveOutcome::Updated(id));

    assert_eq!(row_count(&conn), 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get::<Person>(id).unwrap().age, 31);
    assert_eq!(repo.find_by_id(id).unwrap().age, 31);
}

#[test]
fn delete_by_id_removes_row_and_registry_entry() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    let mut ana = person("Ana", 30);
    let id = repo.save(&mut ana).unwrap().id();

    repo.delete_by_id(id).unwrap();

    assert_eq!(row_count(&conn), 0);
    assert!(!registry.contains::<Person>(id));
    let err = repo.find_by_id(id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { id: missing, .. } if missing == id));
}

#[test]
fn delete_entity_moves_it_to_removed_state() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();

    let mut ana = person("Ana", 30);
    assert_eq!(repo.state_of(&ana), EntityState::Transient);
    repo.save(&mut ana).unwrap();
    assert_eq!(repo.state_of(&ana), EntityState::Persistent);

    repo.delete(&ana).unwrap();
    assert_eq!(repo.state_of(&ana), EntityState::Removed);

    let err = repo.delete(&ana).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn delete_of_untracked_id_never_executes_delete() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();
    conn.execute(
        "INSERT INTO person (id, name, age) VALUES (7, 'Untracked', 40);",
        [],
    )
    .unwrap();

    let err = repo.delete_by_id(7).unwrap_err();

    assert!(matches!(err, RepoError::NotFound { entity: "person", id: 7 }));
    assert_eq!(raw_person(&conn, 7), Some(("Untracked".to_string(), 40)));
}

#[test]
fn delete_of_transient_entity_is_rejected() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();

    let err = repo.delete(&person("Nobody", 1)).unwrap_err();
    assert!(matches!(err, RepoError::Transient { entity: "person" }));
}

#[test]
fn save_with_already_tracked_identity_rolls_back_insert() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();
    let stale = Person {
        id: Some(1),
        name: "Stale".to_string(),
        age: 99,
    };
    registry.add(&stale).unwrap();

    let mut ana = person("Ana", 30);
    let err = repo.save(&mut ana).unwrap_err();

    assert!(err.is_already_tracked());
    assert!(matches!(err, RepoError::AlreadyTracked { id: 1, .. }));
    assert_eq!(ana.id, None);
    assert_eq!(row_count(&conn), 0);
    assert_eq!(registry.get::<Person>(1).unwrap(), stale);
    assert!(conn.is_autocommit());
}

#[test]
fn find_all_is_stable_and_matches_row_count() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();
    for (name, age) in [("Cleo", 52), ("Ana", 30), ("Ben", 17)] {
        repo.save(&mut person(name, age)).unwrap();
    }

    let first = repo.find_all().unwrap();
    let second = repo.find_all().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len() as i64, row_count(&conn));
    let names: Vec<_> = first.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Cleo", "Ana", "Ben"]);
}

#[test]
fn find_by_id_of_untracked_row_is_not_found() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();
    conn.execute(
        "INSERT INTO person (id, name, age) VALUES (3, 'Outside', 20);",
        [],
    )
    .unwrap();

    let err = repo.find_by_id(3).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { id: 3, .. }));
}

#[test]
fn tracked_id_without_row_is_reported_as_missing_row() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    let mut ana = person("Ana", 30);
    let id = repo.save(&mut ana).unwrap().id();
    conn.execute("DELETE FROM person;", []).unwrap();

    let find_err = repo.find_by_id(id).unwrap_err();
    assert!(matches!(
        find_err,
        RepoError::MissingRow {
            operation: Operation::FindById,
            ..
        }
    ));

    ana.age = 31;
    let update_err = repo.save(&mut ana).unwrap_err();
    assert!(matches!(
        update_err,
        RepoError::MissingRow {
            operation: Operation::Update,
            ..
        }
    ));
    assert_eq!(registry.get::<Person>(id).unwrap().age, 30);

    let delete_err = repo.delete_by_id(id).unwrap_err();
    assert!(matches!(
        delete_err,
        RepoError::MissingRow {
            operation: Operation::Delete,
            ..
        }
    ));
    assert!(registry.contains::<Person>(id));
}

#[test]
fn data_access_failures_are_distinct_from_identity_conflicts() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER person_reject_minors BEFORE INSERT ON person
         WHEN NEW.age < 18
         BEGIN SELECT RAISE(ABORT, 'minors are not allowed'); END;",
    )
    .unwrap();

    let mut ben = person("Ben", 17);
    let err = repo.save(&mut ben).unwrap_err();

    assert!(matches!(
        err,
        RepoError::DataAccess {
            operation: Operation::Insert,
            entity: "person",
            ..
        }
    ));
    assert!(!err.is_already_tracked());
    assert_eq!(ben.id, None);
    assert!(registry.is_empty());
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn attach_all_tracks_rows_written_before_repository_existed() {
    let conn = person_db();
    conn.execute_batch(
        "INSERT INTO person (name, age) VALUES ('Ana', 30);
         INSERT INTO person (name, age) VALUES ('Ben', 41);",
    )
    .unwrap();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    assert_eq!(repo.attach_all().unwrap(), 2);
    assert_eq!(registry.tracked_ids::<Person>(), vec![1, 2]);
    assert_eq!(repo.find_by_id(2).unwrap().name, "Ben");

    repo.delete_by_id(1).unwrap();
    assert_eq!(row_count(&conn), 1);
}

#[test]
fn save_participates_in_caller_transaction() {
    let conn = person_db();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();

    conn.execute_batch("BEGIN;").unwrap();
    let id = repo.save(&mut person("Ana", 30)).unwrap().id();
    assert!(!conn.is_autocommit());
    conn.execute_batch("COMMIT;").unwrap();

    assert_eq!(raw_person(&conn, id), Some(("Ana".to_string(), 30)));
}

#[test]
fn cached_sql_follows_schema_column_order() {
    let conn = person_db();
    let repo = Repository::new(&conn, PERSON_SCHEMA, shared_registry()).unwrap();

    assert_eq!(
        repo.sql(Operation::Insert),
        "INSERT INTO person (name, age) VALUES (?1, ?2)"
    );
    assert_eq!(
        repo.sql(Operation::Update),
        "UPDATE person SET name = ?1, age = ?2 WHERE id = ?3"
    );
    assert_eq!(repo.schema().table_name, "person");
}

#[test]
fn saving_removed_entity_never_touches_reused_rowid() {
    let conn = person_db();
    let registry = shared_registry();
    let mut repo = Repository::new(&conn, PERSON_SCHEMA, registry.clone()).unwrap();

    let mut ana = person("Ana", 30);
    let ana_id = repo.save(&mut ana).unwrap().id();
    repo.delete(&ana).unwrap();

    let mut ben = person("Ben", 41);
    let ben_id = repo.save(&mut ben).unwrap().id();
    assert_eq!(ben_id, ana_id, "sqlite reuses the freed rowid");

    ana.age = 99;
    let err = repo.save(&mut ana).unwrap_err();

    assert!(matches!(err, RepoError::NotFound { id, .. } if id == ana_id));
    assert_eq!(raw_person(&conn, ben_id), Some(("Ben".to_string(), 41)));
    assert_eq!(registry.get::<Person>(ben_id).unwrap(), ben);
}
