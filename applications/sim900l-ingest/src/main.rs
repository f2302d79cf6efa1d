use sim900l_ingest::api::{self, routes::INGEST_PATH, AppState};
use sim900l_ingest::{credentials, Config, FirestoreClient};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting sim900l-ingest");

    let cfg = Config::load()?;
    info!("Configuration loaded");

    let creds = match credentials::resolve(&cfg.firestore) {
        Ok(creds) => creds,
        Err(e) => {
            tracing::error!(error = %e, "Firebase initialization error");
            return Err(e.into());
        }
    };
    info!(
        project_id = %creds.account.project_id,
        source = %creds.source,
        "Firebase credentials resolved"
    );

    let client = FirestoreClient::new(&creds.account, &cfg.firestore)?;
    if client.is_emulator() {
        info!("Using Firestore emulator");
    }
    client.check_connection(&cfg.firestore.collection).await;

    let state = AppState::new(
        Arc::new(client),
        cfg.firestore.collection.clone(),
        cfg.ingest.clone(),
    );
    let router = api::create_router(state);
    let addr = cfg.bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);
    info!("SIM900L endpoint: http://{}{}", addr, INGEST_PATH);

    if let Err(e) = api::serve(listener, router, shutdown_signal()).await {
        tracing::error!(error = %e, "API server error");
    }

    info!("Server closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, closing server");
}
