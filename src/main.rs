//! rowkit - round-trips generated rows through the typed access layer.

mod cli;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use cli::{Cli, OutputFormat};
use db_rowkit::bulk::{bulk_insert, ColumnSpec};
use db_rowkit::config::{Config, ConnectionConfig};
use db_rowkit::error::{Result, RowkitError};
use db_rowkit::logging;
use db_rowkit::query::{fetch, fetch_many2, fetch_one, QueryOptions, ResultSetSpec, TypedCursor};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Person {
    id: i64,
    name: String,
    email: Option<String>,
    active: bool,
    balance: Decimal,
    joined_at: NaiveDateTime,
    external_id: Uuid,
}

impl Person {
    fn from_cursor(c: &TypedCursor<'_>) -> Result<Self> {
        Ok(Self {
            id: c.i64("id")?,
            name: c.string("name")?,
            email: c.optional_string("email")?,
            active: c.bool("active")?,
            balance: c.decimal("balance")?,
            joined_at: c.datetime("joined_at")?,
            external_id: c.uuid("external_id")?,
        })
    }

    fn columns() -> Vec<ColumnSpec<Person>> {
        vec![
            ColumnSpec::new("id", |p: &Person| p.id),
            ColumnSpec::new("name", |p: &Person| p.name.clone()),
            ColumnSpec::new("email", |p: &Person| p.email.clone()),
            ColumnSpec::new("active", |p: &Person| p.active),
            ColumnSpec::new("balance", |p: &Person| p.balance),
            ColumnSpec::new("joined_at", |p: &Person| p.joined_at),
            ColumnSpec::new("external_id", |p: &Person| p.external_id),
        ]
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    database: String,
    inserted: u64,
    fetched: usize,
    mismatched: usize,
    active_count: i64,
    first_page: Vec<Person>,
    lookup: Option<Person>,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let conn_str = cli.connection_override()?;
    let connection = config.resolve_connection(conn_str.as_deref(), cli.connection_name())?;
    let options = cli.query_options(&config);
    info!("Connection: {}", connection.display_string());

    let pool = open_pool(&connection).await?;
    let summary = run_demo(&pool, &connection, cli.rows, &options).await;
    pool.close().await;
    let summary = summary?;

    match cli.output_format() {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| RowkitError::internal(format!("Failed to encode summary: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Text => print_summary(&summary),
    }

    if summary.mismatched > 0 {
        return Err(RowkitError::internal(format!(
            "{} rows did not round-trip",
            summary.mismatched
        )));
    }
    Ok(())
}

async fn open_pool(connection: &ConnectionConfig) -> Result<SqlitePool> {
    // Every connection to :memory: is a separate database.
    let max_connections = if connection.is_memory() { 1 } else { 4 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connection.connect_options()?)
        .await?;
    Ok(pool)
}

async fn run_demo(
    pool: &SqlitePool,
    connection: &ConnectionConfig,
    count: usize,
    options: &QueryOptions,
) -> Result<Summary> {
    let started = Instant::now();

    sqlx::query("DROP TABLE IF EXISTS people")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            active BOOLEAN NOT NULL,
            balance TEXT NOT NULL,
            joined_at TEXT NOT NULL,
            external_id TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let people = generate_people(count);
    let inserted = bulk_insert(pool, "people", &people, &Person::columns()).await?;
    info!("Inserted {} rows", inserted);

    let fetched = fetch(
        pool,
        "SELECT * FROM people ORDER BY id",
        Person::from_cursor,
        &[],
        options,
    )
    .await?;
    let mismatched = fetched
        .iter()
        .zip(&people)
        .filter(|(got, want)| got != want)
        .count()
        + fetched.len().abs_diff(people.len());

    let total = ResultSetSpec::new(
        "SELECT COUNT(*) AS total FROM people WHERE active = @active",
        |c| c.i64("total"),
    )
    .bind("active", true);
    let page = ResultSetSpec::new(
        "SELECT * FROM people WHERE active = @active ORDER BY id LIMIT @limit",
        Person::from_cursor,
    )
    .bind("active", true)
    .bind("limit", PAGE_SIZE);
    let (totals, first_page) = fetch_many2(pool, &total, &page, options).await?;

    let lookup_id = people.last().map_or(1, |p| p.id);
    let lookup = fetch_one(
        pool,
        "SELECT * FROM people WHERE id = @id",
        Person::from_cursor,
        &[db_rowkit::db::Parameter::new("id", lookup_id)],
        options,
    )
    .await?;

    Ok(Summary {
        database: connection.display_string(),
        inserted,
        fetched: fetched.len(),
        mismatched,
        active_count: totals.first().copied().unwrap_or_default(),
        first_page,
        lookup,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

fn generate_people(count: usize) -> Vec<Person> {
    let epoch = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap_or_default();

    (1..=count as i64)
        .map(|id| Person {
            id,
            name: format!("Person {id}"),
            email: (id % 3 != 0).then(|| format!("person{id}@example.com")),
            active: id % 2 == 1,
            balance: Decimal::new(id * 1_250 + 7, 2),
            joined_at: epoch + TimeDelta::minutes(id * 90),
            external_id: Uuid::new_v4(),
        })
        .collect()
}

fn print_summary(summary: &Summary) {
    println!("Database:     {}", summary.database);
    println!("Inserted:     {}", summary.inserted);
    println!(
        "Fetched:      {} ({} mismatched)",
        summary.fetched, summary.mismatched
    );
    println!("Active rows:  {}", summary.active_count);
    println!("First page:");
    for person in &summary.first_page {
        println!(
            "  {:>4}  {:<12} {:>10}  {}",
            person.id,
            person.name,
            person.balance,
            person.email.as_deref().unwrap_or("-")
        );
    }
    match &summary.lookup {
        Some(person) => println!("Lookup:       {} ({})", person.name, person.external_id),
        None => println!("Lookup:       not found"),
    }
    println!("Elapsed:      {} ms", summary.elapsed_ms);
}
