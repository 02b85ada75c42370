//! Shared fixtures for integration tests.

use chrono::{NaiveDate, NaiveDateTime};
use db_rowkit::bulk::ColumnSpec;
use db_rowkit::error::Result;
use db_rowkit::query::TypedCursor;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

pub const CREATE_ACCOUNTS: &str = "CREATE TABLE accounts (
    id INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    nickname TEXT,
    tier TEXT NOT NULL,
    active BOOLEAN NOT NULL,
    balance TEXT NOT NULL,
    rate REAL NOT NULL,
    opened_at TEXT NOT NULL,
    external_id TEXT NOT NULL
)";

/// Opens a single-connection pool over a fresh in-memory database.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// Opens a memory pool with the accounts table created.
pub async fn accounts_pool() -> SqlitePool {
    let pool = memory_pool().await;
    sqlx::query(CREATE_ACCOUNTS).execute(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i32,
    pub owner: String,
    pub nickname: Option<String>,
    pub tier: char,
    pub active: bool,
    pub balance: Decimal,
    pub rate: f64,
    pub opened_at: NaiveDateTime,
    pub external_id: Uuid,
}

impl Account {
    pub fn from_cursor(c: &TypedCursor<'_>) -> Result<Self> {
        Ok(Self {
            id: c.i32("id")?,
            owner: c.string("owner")?,
            nickname: c.optional_string("nickname")?,
            tier: c.char("tier")?,
            active: c.bool("active")?,
            balance: c.decimal("balance")?,
            rate: c.f64("rate")?,
            opened_at: c.datetime("opened_at")?,
            external_id: c.uuid("external_id")?,
        })
    }

    pub fn columns() -> Vec<ColumnSpec<Account>> {
        vec![
            ColumnSpec::new("id", |a: &Account| a.id),
            ColumnSpec::new("owner", |a: &Account| a.owner.clone()),
            ColumnSpec::new("nickname", |a: &Account| a.nickname.clone()),
            ColumnSpec::new("tier", |a: &Account| a.tier),
            ColumnSpec::new("active", |a: &Account| a.active),
            ColumnSpec::new("balance", |a: &Account| a.balance),
            ColumnSpec::new("rate", |a: &Account| a.rate),
            ColumnSpec::new("opened_at", |a: &Account| a.opened_at),
            ColumnSpec::new("external_id", |a: &Account| a.external_id),
        ]
    }
}

/// Builds `count` accounts with ids 1..=count.
pub fn accounts(count: i32) -> Vec<Account> {
    (1..=count)
        .map(|id| Account {
            id,
            owner: format!("owner-{id}"),
            nickname: (id % 2 == 0).then(|| format!("nick-{id}")),
            tier: if id % 3 == 0 { 'A' } else { 'B' },
            active: id % 4 != 0,
            balance: Decimal::new(i64::from(id) * 10_001, 2),
            rate: f64::from(id) / 8.0,
            opened_at: NaiveDate::from_ymd_opt(2023, 6, 1)
                .unwrap()
                .and_hms_milli_opt(8, id as u32 % 60, 0, 250)
                .unwrap(),
            external_id: Uuid::new_v4(),
        })
        .collect()
}
