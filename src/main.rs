#![forbid(unsafe_code)]
use anyhow::Result;
use roomgrid::booker::BookingApp;
use roomgrid::gate::GateApp;
use roomgrid::server;
use roomgrid::store::BookingStore;
use roomgrid::sync::{HttpSnapshotSync, NoopSync, SnapshotConfig, SnapshotSync};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

fn snapshot_config() -> Option<SnapshotConfig> {
    Some(SnapshotConfig {
        url: env::var("SNAPSHOT_URL").ok()?,
        bucket: env::var("SNAPSHOT_BUCKET").ok()?,
        object: env::var("SNAPSHOT_OBJECT").ok()?,
        backup_object: env::var("SNAPSHOT_BACKUP_OBJECT").ok()?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv()?;

    info!("Starting server");

    let store_file = PathBuf::from(env::var("DATA_DIR")?).join("bookings.json");

    let sync: Arc<dyn SnapshotSync> = match snapshot_config() {
        Some(config) => {
            let sync = HttpSnapshotSync::new(config);
            sync.restore_if_missing(&store_file).await?;
            Arc::new(sync)
        }
        None => {
            info!("No snapshot storage configured, running without backups");
            Arc::new(NoopSync)
        }
    };

    let store = BookingStore::open(&store_file)?;
    let book_app = Arc::new(RwLock::new(BookingApp::from_config(
        &env::var("CONFIG_DIR")?,
        store,
        sync,
    )?));
    let gate_app = Arc::new(RwLock::new(GateApp::new(env::var("GATE_PASSWORD")?)));

    let app = server::app(book_app, gate_app, env::var("FRONTEND_DIR").ok());

    // run our app with hyper, listening globally on the configured port
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", env::var("PORT")?)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
