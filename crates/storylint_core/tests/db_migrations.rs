use rusqlite::Connection;
use storylint_core::db::migrations::latest_version;
use storylint_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "stories");
    assert_table_exists(&conn, "defects");
    assert_table_exists(&conn, "outbox_events");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storylint.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "stories");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn project_delete_cascades_to_stories_and_defects() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (uuid, name) VALUES ('p1', 'demo');
         INSERT INTO stories (uuid, project_uuid, text) VALUES ('s1', 'p1', 'As a user');
         INSERT INTO defects (uuid, story_uuid, project_uuid, kind, subkind, severity, highlight)
         VALUES ('d1', 's1', 'p1', 'well_formed', 'no_means', 'high', 'Add a means');",
    )
    .unwrap();

    let format: String = conn
        .query_row("SELECT format FROM projects WHERE uuid = 'p1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(format, "As a,I'm able to,So that");

    conn.execute("DELETE FROM projects WHERE uuid = 'p1';", [])
        .unwrap();
    assert_eq!(row_count(&conn, "stories"), 0);
    assert_eq!(row_count(&conn, "defects"), 0);
}

#[test]
fn defect_columns_reject_unknown_values() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (uuid, name) VALUES ('p1', 'demo');
         INSERT INTO stories (uuid, project_uuid, text) VALUES ('s1', 'p1', 'As a user');",
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO defects (uuid, story_uuid, project_uuid, kind, subkind, severity, highlight)
         VALUES ('d1', 's1', 'p1', 'well_formed', 'no_means', 'critical', 'x');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
