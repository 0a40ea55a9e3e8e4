//! SQLite-backed subscriber store using sqlx.

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    async_trait::async_trait,
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    },
    tracing::debug,
    vendorwatch_common::{BeneficiaryId, ChatId, ResolvedStatus, Subscriber},
};

use crate::{
    Error, Result,
    error::Context,
    store::{SubscriberStore, Upsert},
};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A subscriber row plus bookkeeping timestamps (unix ms), for operator listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub subscriber: Subscriber,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// SQLite-backed persistence for subscribers.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url` with its own pool and run migrations.
    ///
    /// `sqlite::memory:` gets a single connection, since every connection to
    /// an in-memory database sees a different database.
    pub async fn new(database_url: &str) -> Result<Self> {
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to SQLite")?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Open (creating if needed) the database file at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::external(format!("create {}", parent.display()), e))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;

        crate::run_migrations(&pool).await?;
        debug!(path = %path.display(), "subscriber database ready");

        Ok(Self { pool })
    }

    /// All subscribers with their timestamps, oldest registration first.
    pub async fn list_records(&self) -> Result<Vec<SubscriberRecord>> {
        let rows = sqlx::query(
            "SELECT chat_id, beneficiary_id, last_known_status, created_at, updated_at
             FROM subscribers ORDER BY created_at, chat_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SubscriberRecord {
                    subscriber: subscriber_from_row(row)?,
                    created_at_ms: row.get("created_at"),
                    updated_at_ms: row.get("updated_at"),
                })
            })
            .collect()
    }
}

fn subscriber_from_row(row: &SqliteRow) -> Result<Subscriber> {
    let chat_id: ChatId = row.get("chat_id");
    let raw_id: String = row.get("beneficiary_id");
    let beneficiary_id = BeneficiaryId::parse(&raw_id)
        .with_context(|| format!("corrupt beneficiary id for chat {chat_id}"))?;
    let status: String = row.get("last_known_status");
    let Ok(last_known_status) = status.parse::<ResolvedStatus>();
    Ok(Subscriber {
        chat_id,
        beneficiary_id,
        last_known_status,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    async fn list_all(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(
            "SELECT chat_id, beneficiary_id, last_known_status FROM subscribers ORDER BY chat_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscriber_from_row).collect()
    }

    async fn get(&self, chat_id: ChatId) -> Result<Option<Subscriber>> {
        let row = sqlx::query(
            "SELECT chat_id, beneficiary_id, last_known_status FROM subscribers WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(subscriber_from_row).transpose()
    }

    async fn upsert(&self, chat_id: ChatId, beneficiary_id: &BeneficiaryId) -> Result<Upsert> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<ChatId> =
            sqlx::query_scalar("SELECT chat_id FROM subscribers WHERE beneficiary_id = ?")
                .bind(beneficiary_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            Some(owner) if owner == chat_id => return Ok(Upsert::Unchanged),
            Some(_) => return Ok(Upsert::Conflict),
            None => {},
        }

        let exists: Option<ChatId> =
            sqlx::query_scalar("SELECT chat_id FROM subscribers WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&mut *tx)
                .await?;
        let now = now_ms();
        let (query, outcome) = if exists.is_some() {
            (
                sqlx::query(
                    "UPDATE subscribers
                     SET beneficiary_id = ?, last_known_status = ?, updated_at = ?
                     WHERE chat_id = ?",
                )
                .bind(beneficiary_id.as_str())
                .bind(ResolvedStatus::Unknown.to_string())
                .bind(now)
                .bind(chat_id),
                Upsert::Updated,
            )
        } else {
            (
                sqlx::query(
                    "INSERT INTO subscribers (chat_id, beneficiary_id, last_known_status, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(chat_id)
                .bind(beneficiary_id.as_str())
                .bind(ResolvedStatus::Unknown.to_string())
                .bind(now)
                .bind(now),
                Upsert::Inserted,
            )
        };

        match query.execute(&mut *tx).await {
            Ok(_) => {},
            // Another writer claimed the beneficiary between our check and the write.
            Err(e) if is_unique_violation(&e) => return Ok(Upsert::Conflict),
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_status(
        &self,
        chat_id: ChatId,
        beneficiary_id: &BeneficiaryId,
        status: &ResolvedStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE subscribers SET last_known_status = ?, updated_at = ?
             WHERE chat_id = ? AND beneficiary_id = ?",
        )
        .bind(status.to_string())
        .bind(now_ms())
        .bind(chat_id)
        .bind(beneficiary_id.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get(chat_id).await? {
            Some(_) => Err(Error::superseded(chat_id, beneficiary_id)),
            None => Err(Error::not_found(chat_id)),
        }
    }
}
