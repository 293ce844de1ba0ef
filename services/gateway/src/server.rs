// Listener front-ends for the gateway router
// TCP goes through axum::serve; Unix domain sockets use a hyper-util accept loop

use axum::Router;
use std::future::Future;
use tokio::time::Duration;
use tracing::{info, warn};

#[cfg(unix)]
use std::path::Path;

/// Serve `router` on a TCP address until `shutdown` resolves
pub async fn serve_tcp<F>(router: Router, addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serve `router` on a Unix domain socket until `shutdown` resolves
///
/// Open connections get `grace` to finish after the listener closes. The
/// socket file is removed on the way out.
#[cfg(unix)]
pub async fn serve_unix<F>(
    router: Router,
    path: &Path,
    shutdown: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder;
    use hyper_util::service::TowerToHyperService;
    use std::os::unix::fs::FileTypeExt;
    use tokio::net::UnixListener;
    use tokio::task::JoinSet;

    // A socket left behind by an unclean exit would make bind fail
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if meta.file_type().is_socket() {
            warn!(path = %path.display(), "Removing stale socket file");
            std::fs::remove_file(path)?;
        }
    }

    let listener = UnixListener::bind(path)?;
    info!(path = %path.display(), "Listening on unix socket");

    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let service = TowerToHyperService::new(router.clone());
                connections.spawn(async move {
                    if let Err(e) = Builder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .await
                    {
                        warn!("Failed to serve connection: {}", e);
                    }
                });
            }

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);

    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(open = connections.len(), "Aborting connections still open after grace period");
        connections.shutdown().await;
    }

    std::fs::remove_file(path)?;
    info!(path = %path.display(), "Unix socket closed");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
