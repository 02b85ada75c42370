//! Fetch integration tests.
//!
//! Tests single-query fetches and typed column access against SQLite.

use super::common::{accounts, accounts_pool, memory_pool, Account};
use db_rowkit::bulk::bulk_insert;
use db_rowkit::db::Parameter;
use db_rowkit::error::RowkitError;
use db_rowkit::query::{fetch, fetch_one, QueryOptions};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_bulk_insert_then_fetch_round_trips() {
    let pool = accounts_pool().await;
    let rows = accounts(25);

    let inserted = bulk_insert(&pool, "accounts", &rows, &Account::columns())
        .await
        .unwrap();
    let fetched = fetch(
        &pool,
        "SELECT * FROM accounts ORDER BY id",
        Account::from_cursor,
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(inserted, 25);
    assert_eq!(fetched, rows);
}

#[tokio::test]
async fn test_fetch_zero_rows() {
    let pool = accounts_pool().await;

    let fetched = fetch(
        &pool,
        "SELECT * FROM accounts",
        Account::from_cursor,
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert!(fetched.is_empty());
}

#[tokio::test]
async fn test_fetch_binds_named_parameters() {
    let pool = accounts_pool().await;
    bulk_insert(&pool, "accounts", &accounts(10), &Account::columns())
        .await
        .unwrap();

    let ids = fetch(
        &pool,
        "SELECT id FROM accounts WHERE id > @min AND owner <> :skip ORDER BY id",
        |c| c.i32("id"),
        &[Parameter::new("min", 6), Parameter::new("skip", "owner-8")],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(ids, vec![7, 9, 10]);
}

#[tokio::test]
async fn test_fetch_one_returns_first_row() {
    let pool = accounts_pool().await;
    let rows = accounts(5);
    bulk_insert(&pool, "accounts", &rows, &Account::columns())
        .await
        .unwrap();

    let last = fetch_one(
        &pool,
        "SELECT * FROM accounts ORDER BY id DESC",
        Account::from_cursor,
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();
    let missing = fetch_one(
        &pool,
        "SELECT * FROM accounts WHERE id = @id",
        Account::from_cursor,
        &[Parameter::new("id", 99)],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(last, Some(rows[4].clone()));
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_optional_accessors_read_null() {
    let pool = memory_pool().await;

    let row = fetch_one(
        &pool,
        "SELECT NULL AS n, 5 AS five",
        |c| Ok((c.optional_i64("n")?, c.optional_i64("five")?)),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(row, Some((None, Some(5))));
}

#[tokio::test]
async fn test_mandatory_accessor_on_null_fails() {
    let pool = memory_pool().await;

    let result = fetch(
        &pool,
        "SELECT NULL AS n",
        |c| c.i64("n"),
        &[],
        &QueryOptions::default(),
    )
    .await;

    match result {
        Err(RowkitError::ColumnNull { column, .. }) => assert_eq!(column, "n"),
        other => panic!("expected ColumnNull, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_accessor_names_the_column() {
    let pool = memory_pool().await;

    let result = fetch(
        &pool,
        "SELECT 'abc' AS label",
        |c| c.i32("label"),
        &[],
        &QueryOptions::default(),
    )
    .await;

    match result {
        Err(err @ RowkitError::ColumnTypeMismatch { .. }) => {
            assert_eq!(err.subject(), Some("label"));
            assert!(std::error::Error::source(&err).is_some());
        }
        other => panic!("expected ColumnTypeMismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_column_for_both_accessor_kinds() {
    let pool = memory_pool().await;

    for optional in [false, true] {
        let result = fetch(
            &pool,
            "SELECT 1 AS one",
            |c| {
                if optional {
                    c.optional_i32("two")
                } else {
                    c.i32("two").map(Some)
                }
            },
            &[],
            &QueryOptions::default(),
        )
        .await;

        assert!(
            matches!(result, Err(RowkitError::UnknownColumn { ref column, .. }) if column == "two"),
            "optional={optional}: {result:?}"
        );
    }
}

#[tokio::test]
async fn test_sql_errors_pass_through() {
    let pool = memory_pool().await;

    let result = fetch(
        &pool,
        "SELECT * FROM no_such_table",
        |c| c.i32("id"),
        &[],
        &QueryOptions::default(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RowkitError::Database(_)));
    assert!(err.to_string().contains("no_such_table"));
}

#[tokio::test]
async fn test_fetch_inside_transaction_sees_uncommitted_rows() {
    let pool = accounts_pool().await;
    let rows = accounts(3);

    let mut tx = pool.begin().await.unwrap();
    bulk_insert(&mut tx, "accounts", &rows, &Account::columns())
        .await
        .unwrap();
    let inside = fetch(
        &mut *tx,
        "SELECT id FROM accounts",
        |c| c.i32("id"),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    let after = fetch(
        &pool,
        "SELECT id FROM accounts",
        |c| c.i32("id"),
        &[],
        &QueryOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(inside.len(), 3);
    assert!(after.is_empty());
}
