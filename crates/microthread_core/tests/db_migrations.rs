use microthread_core::db::migrations::{apply_migrations, latest_version, schema_tables};
use microthread_core::db::{open_connection, ConnectSettings, DbError, Dsn};
use microthread_core::{Engine, EngineConfig, EngineError, DEFAULT_CONNECTION};
use rusqlite::Connection;

fn open(raw: &str) -> Result<Connection, DbError> {
    open_connection(DEFAULT_CONNECTION, &Dsn::parse(raw), ConnectSettings::default())
}

#[test]
fn in_memory_connection_applies_all_migrations() {
    let conn = open("sqlite::memory:").unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in schema_tables() {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn content_and_session_schemas_are_applied_once() {
    assert_eq!(
        schema_tables(),
        vec![
            "posts",
            "posts_family",
            "taxonomy",
            "posts_taxonomy",
            "meta",
            "posts_meta",
            "users",
            "posts_users",
            "sessions",
        ]
    );

    let mut conn = Connection::open_in_memory().unwrap();
    assert_eq!(apply_migrations(&mut conn).unwrap(), vec![1, 2]);
    assert!(apply_migrations(&mut conn).unwrap().is_empty());
    assert_eq!(schema_version(&conn), latest_version());

    let mut partial = Connection::open_in_memory().unwrap();
    partial.execute_batch("PRAGMA user_version = 1;").unwrap();
    assert_eq!(apply_migrations(&mut partial).unwrap(), vec![2]);
    assert_table_exists(&partial, "sessions");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let raw = format!("sqlite:{}", dir.path().join("board.db").display());

    let conn_first = open(&raw).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open(&raw).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "posts");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open(&format!("sqlite:{}", path.display())).unwrap_err();
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

    let config = EngineConfig::default()
        .with_connection(DEFAULT_CONNECTION, format!("sqlite:{}", path.display()));
    let mut engine = Engine::new(&config).unwrap();
    assert!(matches!(
        engine.acquire(DEFAULT_CONNECTION),
        Err(EngineError::Connect(DbError::UnsupportedSchemaVersion { .. }))
    ));
}

#[test]
fn migrations_can_be_skipped() {
    let settings = ConnectSettings {
        apply_migrations: false,
        ..ConnectSettings::default()
    };
    let conn = open_connection("bare", &Dsn::parse("sqlite::memory:"), settings).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn non_sqlite_targets_are_rejected() {
    let err = open("mysql:host=localhost;dbname=board").unwrap_err();
    assert!(matches!(err, DbError::UnsupportedDialect { .. }));
    assert!(err.is_configuration());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
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
