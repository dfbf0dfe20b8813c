//! Eczacı AI terminal client

use eczaci_ai::app::App;
use eczaci_ai::cli::Terminal;
use eczaci_ai::config::AppConfig;
use eczaci_ai::gateway::{HttpGateway, LoggingGateway};
use eczaci_ai::storage::{KeyValueStore, MemoryStore, SessionPersistence, SqliteStore, Tier};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout is the chat surface
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eczaci_ai=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        gateway = %config.gateway_url,
        session_id = %config.session_id,
        "Starting Eczacı AI client"
    );

    let gateway = HttpGateway::new(config.gateway_url.clone(), config.http_timeout)?;
    let gateway = Arc::new(LoggingGateway::new(gateway));

    let persistence = SessionPersistence::new(
        open_store(Tier::Durable, &config.durable_store_path()),
        open_store(Tier::Session, &config.session_store_path()),
    );

    let mut app = App::new(gateway, persistence);
    app.boot()?;

    let mut terminal = Terminal::new(tokio::io::stdin(), tokio::io::stdout());
    terminal.run(&mut app).await?;

    tracing::info!("Shutting down");
    Ok(())
}

/// Open a tier's database, falling back to memory so the client still runs
fn open_store(tier: Tier, path: &Path) -> Arc<dyn KeyValueStore> {
    match SqliteStore::open(path) {
        Ok(store) => {
            tracing::info!(?tier, path = %path.display(), "Opened session store");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                ?tier,
                path = %path.display(),
                error = %e,
                "Failed to open session store, using memory"
            );
            Arc::new(MemoryStore::new())
        }
    }
}
