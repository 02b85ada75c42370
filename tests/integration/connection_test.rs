//! Connection source integration tests.
//!
//! Tests descriptor-based sources that open a connection per call.

use db_rowkit::bulk::{bulk_insert, ColumnSpec};
use db_rowkit::config::{Config, ConnectionConfig};
use db_rowkit::db::Parameter;
use db_rowkit::error::RowkitError;
use db_rowkit::query::{fetch, fetch_many2, fetch_one, QueryOptions, ResultSetSpec};
use pretty_assertions::assert_eq;

fn file_config(dir: &tempfile::TempDir) -> ConnectionConfig {
    ConnectionConfig::for_path(dir.path().join("rowkit.db"))
}

async fn create_notes(config: &ConnectionConfig) {
    let created: Vec<()> = fetch(
        config,
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
        |_| Ok(()),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();
    assert!(created.is_empty());
}

#[tokio::test]
async fn test_descriptor_source_opens_a_connection_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);
    create_notes(&config).await;

    let bodies = vec!["first", "second"];
    let columns = vec![ColumnSpec::new("body", |b: &&str| b.to_string())];
    let inserted = bulk_insert(&config, "notes", &bodies, &columns)
        .await
        .unwrap();

    let fetched = fetch(
        &config,
        "SELECT body FROM notes ORDER BY id",
        |c| c.string("body"),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(fetched, vec!["first".to_string(), "second".to_string()]);
    assert!(dir.path().join("rowkit.db").exists());
}

#[tokio::test]
async fn test_descriptor_source_runs_batches() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);
    create_notes(&config).await;
    let columns = vec![ColumnSpec::new("body", |b: &String| b.clone())];
    let bodies: Vec<String> = (1..=5).map(|i| format!("note {i}")).collect();
    bulk_insert(&config, "notes", &bodies, &columns).await.unwrap();

    let count = ResultSetSpec::new("SELECT COUNT(*) AS n FROM notes", |c| c.i64("n"));
    let one = ResultSetSpec::new("SELECT body FROM notes WHERE id = @id", |c| c.string("body"))
        .bind("id", 3);

    let (counts, bodies) = fetch_many2(&config, &count, &one, &QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(counts, vec![5]);
    assert_eq!(bodies, vec!["note 3".to_string()]);
}

#[tokio::test]
async fn test_connection_string_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from-url.db");
    let config =
        ConnectionConfig::from_connection_string(&format!("sqlite://{}?mode=rwc", path.display()))
            .unwrap();

    let value = fetch_one(
        &config,
        "SELECT @x + 1 AS y",
        |c| c.i64("y"),
        &[Parameter::new("x", 41)],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(value, Some(42));
    assert!(path.exists());
}

#[tokio::test]
async fn test_read_write_mode_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig {
        create_if_missing: false,
        ..file_config(&dir)
    };

    let result = fetch(
        &config,
        "SELECT 1 AS one",
        |c| c.i32("one"),
        &[],
        &QueryOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(RowkitError::Database(_))));
}

#[tokio::test]
async fn test_missing_database_is_a_config_error() {
    let config = ConnectionConfig::default();

    let result = fetch(
        &config,
        "SELECT 1 AS one",
        |c| c.i32("one"),
        &[],
        &QueryOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(RowkitError::Config(_))));
}

#[tokio::test]
async fn test_config_file_named_connection() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("named.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[query]\ntimeout_secs = 7\n\n[connections.local]\ndatabase = {:?}\nbusy_timeout_secs = 2\n",
            db_path.display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load_from_file(&config_path).unwrap();
    let connection = config.resolve_connection(None, Some("local")).unwrap();

    let one = fetch_one(
        &connection,
        "SELECT 1 AS one",
        |c| c.i32("one"),
        &[],
        &config.query,
    )
    .await
    .unwrap();

    assert_eq!(one, Some(1));
    assert_eq!(config.query.timeout.as_secs(), 7);
    assert_eq!(connection.busy_timeout_secs, Some(2));
}
