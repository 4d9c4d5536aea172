use std::sync::Arc;

use noteboard::config::ServerConfig;
use noteboard::state::AppState;
use noteboard::store::NoteStore;
use noteboard::store::memory::MemoryStore;
use noteboard::store::postgres::PgStore;
use noteboard::{db, routes};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();

    let store: Arc<dyn NoteStore> = match &config.database_url {
        Some(url) => match db::init_pool(url, config.database_max_connections).await {
            Ok(pool) => {
                tracing::info!("using postgres store");
                Arc::new(PgStore::new(pool))
            }
            Err(e) => {
                tracing::error!(error = %e, "database init failed");
                return std::process::ExitCode::FAILURE;
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, records will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let app = routes::app(AppState::new(store));
    let listener = match tokio::net::TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr(), "failed to bind");
            return std::process::ExitCode::FAILURE;
        }
    };

    tracing::info!(port = config.port, "noteboard store server listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
