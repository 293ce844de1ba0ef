// Credit Ledger Service - entry point
// Opens the ledger, serves the API over TCP or a Unix socket and drains the
// account actors on shutdown

use credit_ledger_gateway::{app, server, AppState};
use ledger_core::{Config, Ledger};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_line_number(true)
            .with_env_filter(filter)
            .init();
    }

    info!("Starting Credit Ledger");

    // Load configuration from environment
    let config = Config::from_env()?;
    let bind_addr = config.http_listen_addr.clone();
    let socket_path = config.unix_socket_path.clone();
    let grace = Duration::from_millis(config.request_timeout_ms);

    let ledger = Arc::new(Ledger::open(config).await?);
    info!(accounts = ledger.account_ids().len(), "Ledger opened");

    let state = AppState::new(Arc::clone(&ledger))?;
    let router = app(state);

    info!("   POST /clientes/:id/transacoes - Submit transaction");
    info!("   GET  /clientes/:id/extrato    - Get statement");
    info!("   GET  /health                  - Health check");
    info!("   GET  /metrics                 - Prometheus metrics");

    match socket_path {
        #[cfg(unix)]
        Some(path) => server::serve_unix(router, &path, server::shutdown_signal(), grace).await?,
        #[cfg(not(unix))]
        Some(_) => anyhow::bail!("Unix domain sockets are not supported on this platform"),
        None => server::serve_tcp(router, &bind_addr, server::shutdown_signal()).await?,
    }

    info!("HTTP server stopped");
    match Arc::try_unwrap(ledger) {
        Ok(ledger) => ledger.shutdown().await?,
        Err(_) => warn!("Ledger still referenced; skipping actor drain"),
    }

    Ok(())
}
