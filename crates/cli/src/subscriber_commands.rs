use std::path::Path;

use {
    anyhow::Context,
    chrono::{DateTime, Utc},
    chrono_tz::Tz,
    clap::Subcommand,
    vendorwatch_config::VendorwatchConfig,
    vendorwatch_store::{SqliteStore, SubscriberRecord},
};

#[derive(Subcommand)]
pub enum SubscriberAction {
    /// List every subscriber with its last known status.
    List,
}

pub async fn handle_subscribers(
    action: &SubscriberAction,
    config: &VendorwatchConfig,
    data_dir: &Path,
) -> anyhow::Result<()> {
    match action {
        SubscriberAction::List => list(config, data_dir).await,
    }
}

async fn list(config: &VendorwatchConfig, data_dir: &Path) -> anyhow::Result<()> {
    let db_path = config.storage.database_path_in(data_dir);
    if !db_path.exists() {
        println!("No database at {}.", db_path.display());
        return Ok(());
    }
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    let records = store.list_records().await?;
    if records.is_empty() {
        println!("No subscribers.");
        return Ok(());
    }

    let tz = config.monitor.timezone.parse::<Tz>().unwrap_or(Tz::UTC);
    println!(
        "{:<14} {:<16} {:<24} {:<20} {}",
        "CHAT", "BENEFICIARY", "STATUS", "REGISTERED", "UPDATED"
    );
    for record in &records {
        println!("{}", row(record, tz));
    }
    println!("\n{} subscriber(s)", records.len());
    Ok(())
}

fn row(record: &SubscriberRecord, tz: Tz) -> String {
    let sub = &record.subscriber;
    format!(
        "{:<14} {:<16} {:<24} {:<20} {}",
        sub.chat_id,
        sub.beneficiary_id.as_str(),
        sub.last_known_status.to_string(),
        format_ms(record.created_at_ms, tz),
        format_ms(record.updated_at_ms, tz),
    )
}

fn format_ms(ms: i64, tz: Tz) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
