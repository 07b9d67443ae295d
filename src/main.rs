use clap::Parser;
use rental_worker::broker::BrokerConnector;
use rental_worker::storage::{DatabaseConfig, PgRentalStore};
use rental_worker::{Worker, WorkerArgs, WorkerConfig};
use std::error::Error;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("INFO")))
        .init();

    let args = WorkerArgs::parse();
    let config = WorkerConfig::from(&args);

    let database = DatabaseConfig::from_connection_string(&args.database_url)?;
    let store = PgRentalStore::new(database).await?;
    let connector = BrokerConnector::new(config.broker_config());

    let worker = Worker::new(config, Arc::new(store), Arc::new(connector));
    let summary = worker
        .run(async {
            if let Err(err) = signal::ctrl_c().await {
                error!(error = %err, "Unable to listen for the interrupt signal");
            }
        })
        .await?;

    info!(processed = summary.processed, "Worker stopped");
    Ok(())
}
