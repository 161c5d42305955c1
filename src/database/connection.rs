use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

use crate::models::night::SleepNight;

/// Bumped whenever the table layout changes. A database carrying any other
/// version is dropped and recreated.
const SCHEMA_VERSION: i64 = 1;

/// Single-table store for sleep nights.
///
/// Cloning is cheap: clones share the pool and the listing channel, so every
/// observer sees mutations made through any clone.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    nights_tx: Arc<watch::Sender<Vec<SleepNight>>>,
    publish_lock: Arc<Mutex<()>>,
}

impl Database {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        // An in-memory database lives only as long as its connection, so the
        // pool must never recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let (nights_tx, _) = watch::channel(Vec::new());
        let database = Self {
            pool,
            nights_tx: Arc::new(nights_tx),
            publish_lock: Arc::new(Mutex::new(())),
        };
        database.create_table().await?;
        database.publish_nights().await?;
        Ok(database)
    }

    pub async fn create_table(&self) -> Result<()> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if version != SCHEMA_VERSION {
            if version != 0 {
                log::warn!(
                    "Schema version {} does not match {}, recreating sleep table",
                    version,
                    SCHEMA_VERSION
                );
            }
            sqlx::query("DROP TABLE IF EXISTS daily_sleep_quality_table")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_sleep_quality_table (
                night_id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time_milli INTEGER NOT NULL,
                end_time_milli INTEGER NOT NULL,
                quality_rating INTEGER NOT NULL DEFAULT -1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let set_version = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
        sqlx::query(&set_version).execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new night and returns the id the store assigned to it. The
    /// `night_id` carried by `night` is ignored.
    pub async fn insert(&self, night: &SleepNight) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO daily_sleep_quality_table (start_time_milli, end_time_milli, quality_rating) VALUES (?1, ?2, ?3)",
        )
        .bind(night.start_time_milli)
        .bind(night.end_time_milli)
        .bind(night.sleep_quality_rating)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        log::debug!("Inserted night {}", id);
        self.publish_nights().await?;
        Ok(id)
    }

    /// Replaces every column of the row with the same id. Updating a missing
    /// row is not an error.
    pub async fn update(&self, night: &SleepNight) -> Result<()> {
        let result = sqlx::query(
            "UPDATE daily_sleep_quality_table SET start_time_milli = ?1, end_time_milli = ?2, quality_rating = ?3 WHERE night_id = ?4",
        )
        .bind(night.start_time_milli)
        .bind(night.end_time_milli)
        .bind(night.sleep_quality_rating)
        .bind(night.night_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            log::debug!("Update skipped, night {} not found", night.night_id);
        }
        self.publish_nights().await?;
        Ok(())
    }

    pub async fn get(&self, key: i64) -> Result<Option<SleepNight>> {
        let night = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table WHERE night_id = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(night)
    }

    /// The most recently created night, open or not.
    pub async fn get_tonight(&self) -> Result<Option<SleepNight>> {
        let night = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table ORDER BY night_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(night)
    }

    pub async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM daily_sleep_quality_table")
            .execute(&self.pool)
            .await?;
        log::info!("Cleared {} nights", result.rows_affected());
        self.publish_nights().await?;
        Ok(())
    }

    /// All nights, newest first.
    pub async fn get_all_nights(&self) -> Result<Vec<SleepNight>> {
        let nights = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table ORDER BY night_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(nights)
    }

    /// Live listing of all nights, newest first. The receiver is notified
    /// after every mutation that changes the listing; dropping it
    /// unsubscribes.
    pub fn observe_all(&self) -> watch::Receiver<Vec<SleepNight>> {
        self.nights_tx.subscribe()
    }

    // Query and send under one lock so a slower publisher can never overwrite
    // a newer listing with an older one.
    async fn publish_nights(&self) -> Result<()> {
        let _guard = self.publish_lock.lock().await;
        let nights = self.get_all_nights().await?;
        self.nights_tx.send_if_modified(|current| {
            if *current == nights {
                false
            } else {
                *current = nights;
                true
            }
        });
        Ok(())
    }
}
