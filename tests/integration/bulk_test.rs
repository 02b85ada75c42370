//! Bulk insert integration tests.

use super::common::{accounts, accounts_pool, memory_pool, Account};
use db_rowkit::bulk::{bulk_insert, bulk_insert_with, ColumnSpec};
use db_rowkit::db::BulkLoadOptions;
use db_rowkit::error::RowkitError;
use db_rowkit::query::{fetch, fetch_one, QueryOptions};
use pretty_assertions::assert_eq;
use std::time::Duration;

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    fetch_one(
        pool,
        &format!("SELECT COUNT(*) AS n FROM {table}"),
        |c| c.i64("n"),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap()
    .unwrap_or_default()
}

#[tokio::test]
async fn test_bulk_insert_returns_row_count() {
    let pool = accounts_pool().await;

    let inserted = bulk_insert(&pool, "accounts", &accounts(250), &Account::columns())
        .await
        .unwrap();

    assert_eq!(inserted, 250);
    assert_eq!(count(&pool, "accounts").await, 250);
}

#[tokio::test]
async fn test_bulk_insert_no_rows() {
    let pool = accounts_pool().await;
    let rows: Vec<Account> = Vec::new();

    let inserted = bulk_insert(&pool, "accounts", &rows, &Account::columns())
        .await
        .unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(count(&pool, "accounts").await, 0);
}

#[tokio::test]
async fn test_bulk_insert_subset_of_columns() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL, note TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    let labels = vec!["red", "green", "blue"];
    let columns = vec![ColumnSpec::new("label", |s: &&str| s.to_string())];

    bulk_insert(&pool, "tags", &labels, &columns).await.unwrap();

    let rows = fetch(
        &pool,
        "SELECT id, label, note FROM tags ORDER BY id",
        |c| Ok((c.i64("id")?, c.string("label")?, c.optional_string("note")?)),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "red".to_string(), None),
            (2, "green".to_string(), None),
            (3, "blue".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_bulk_insert_quotes_identifiers() {
    let pool = memory_pool().await;
    sqlx::query(r#"CREATE TABLE "order items" ("group" TEXT, "qty" INTEGER)"#)
        .execute(&pool)
        .await
        .unwrap();
    let rows = vec![("a", 1), ("b", 2)];
    let columns = vec![
        ColumnSpec::new("group", |r: &(&str, i64)| r.0.to_string()),
        ColumnSpec::new("qty", |r: &(&str, i64)| r.1),
    ];

    let inserted = bulk_insert(&pool, "order items", &rows, &columns)
        .await
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(count(&pool, r#""order items""#).await, 2);
}

#[tokio::test]
async fn test_failed_load_rolls_back() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE ids (id INTEGER PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    let rows = vec![1_i64, 2, 2, 3];
    let columns = vec![ColumnSpec::new("id", |id: &i64| *id)];

    let result = bulk_insert(&pool, "ids", &rows, &columns).await;

    assert!(matches!(result, Err(RowkitError::Database(_))));
    assert_eq!(count(&pool, "ids").await, 0);
}

#[tokio::test]
async fn test_missing_destination_column_fails() {
    let pool = accounts_pool().await;
    let rows = vec![1_i64];
    let columns = vec![ColumnSpec::new("no_such_column", |id: &i64| *id)];

    let result = bulk_insert(&pool, "accounts", &rows, &columns).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RowkitError::Database(_)));
    assert!(err.to_string().contains("no_such_column"));
}

#[tokio::test]
async fn test_bulk_insert_with_options() {
    let pool = accounts_pool().await;
    let options = BulkLoadOptions {
        table_lock: false,
        timeout: Some(Duration::from_secs(30)),
    };

    let inserted = bulk_insert_with(&pool, "accounts", &accounts(10), &Account::columns(), options)
        .await
        .unwrap();

    assert_eq!(inserted, 10);
}

#[tokio::test]
async fn test_bulk_insert_inside_committed_transaction() {
    let pool = accounts_pool().await;

    let mut tx = pool.begin().await.unwrap();
    bulk_insert(&mut tx, "accounts", &accounts(5), &Account::columns())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count(&pool, "accounts").await, 5);
}
