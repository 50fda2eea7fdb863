//! Dispatch engine process: delivers scheduled campaign items through the gateway.

use campaign_engine::{
    config::{
        database::{create_connection, create_tables},
        load_app_configuration,
    },
    engine::{DispatchEngine, run_every, shutdown_signal},
    errors::Result,
    gateway::{MessagingGateway, WahaGateway},
    media::media_store_from_config,
};
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};
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
    let db = create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db).await?;

    let gateway: Arc<dyn MessagingGateway> = Arc::new(WahaGateway::new(&app_config.gateway));
    let engine = DispatchEngine::new(
        db.clone(),
        gateway,
        media_store_from_config(&app_config.media),
        app_config.dispatch,
    );

    let engine = &engine;
    run_every(
        "dispatcher",
        app_config.dispatch.interval(),
        shutdown_signal(),
        move || engine.run_once(Utc::now()),
    )
    .await;

    db.close().await?;
    info!("Dispatcher stopped");
    Ok(())
}
