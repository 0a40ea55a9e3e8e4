//! Subscriber persistence: which chat tracks which beneficiary, and the last
//! status it was told about.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;

pub use {
    error::{Error, Result},
    store::{SubscriberStore, Upsert},
    store_memory::InMemoryStore,
    store_sqlite::{SqliteStore, SubscriberRecord},
};

/// Run database migrations for the subscriber table.
///
/// Called by [`SqliteStore::new`] and [`SqliteStore::open`].
pub(crate) async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
