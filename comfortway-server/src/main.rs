//! Comfort Way backend server

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use comfortway_server::{
    routes, AppState, Config, ConsoleEmailSender, DocumentStore, EmailSender,
    HttpIdentityProvider, InMemoryDocumentStore, SmtpEmailSender, SqliteDocumentStore,
};

/// How often stale sign-in link records are swept
const LINK_PURGE_INTERVAL: StdDuration = StdDuration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comfortway_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "Loaded configuration");

    let store: Box<dyn DocumentStore> = match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path, "Using SQLite document store");
            Box::new(SqliteDocumentStore::open(path)?)
        }
        None => {
            tracing::warn!("DATABASE_PATH not set; data will not survive a restart");
            Box::new(InMemoryDocumentStore::new())
        }
    };

    let email_sender: Box<dyn EmailSender> = match config.smtp.clone() {
        Some(smtp) => Box::new(SmtpEmailSender::new(smtp).map_err(anyhow::Error::msg)?),
        None => {
            tracing::info!("SMTP not configured; sign-in links will be printed");
            Box::new(ConsoleEmailSender::new())
        }
    };

    let provider = HttpIdentityProvider::new(config.identity_provider.clone());

    let state = Arc::new(AppState::new(config.clone(), store, provider, email_sender));

    let purge_state = Arc::clone(&state);
    let max_age = Duration::minutes(config.email_link_ttl_minutes);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LINK_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = purge_state.credentials.purge_stale_links(max_age).await {
                tracing::warn!(error = %e, "Sign-in link purge failed");
            }
        }
    });

    let app = routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
