//! Reminder engine process: reconciles the payment ledger and reminds unpaid members.

use campaign_engine::{
    config::{
        database::{create_connection, create_tables},
        load_app_configuration,
    },
    engine::{ReminderEngine, run_every, shutdown_signal},
    errors::Result,
    gateway::{MessagingGateway, WahaGateway},
    ledger::{GoogleSheetSource, LedgerSource},
};
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Non-fatal, env vars can be set externally
    dotenv().ok();

    let app_config = load_app_configuration()?;
    let sources: Vec<Arc<dyn LedgerSource>> = app_config
        .sheets
        .sources()?
        .into_iter()
        .map(|source| Arc::new(GoogleSheetSource::new(source)) as Arc<dyn LedgerSource>)
        .collect();
    if sources.is_empty() {
        warn!("No ledger sources configured, every member will look unpaid");
    }

    let db = create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db).await?;

    let gateway: Arc<dyn MessagingGateway> = Arc::new(WahaGateway::new(&app_config.gateway));
    let engine = ReminderEngine::new(db.clone(), gateway, sources, app_config.reminder);

    let engine = &engine;
    run_every(
        "reminder",
        app_config.reminder.interval(),
        shutdown_signal(),
        move || engine.run_once(Utc::now()),
    )
    .await;

    db.close().await?;
    info!("Reminder engine stopped");
    Ok(())
}
