//! Server lifecycle: Starting → Serving → Draining → Stopped.

use anyhow::{anyhow, Result};
use apiserver_storage::WorkerStore;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinError;

use crate::app::build_http_app;
use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// Owns the HTTP app and the database handle for one run of the server.
pub struct Server {
    config: Arc<ServerConfig>,
    store: Arc<WorkerStore>,
    app: Router,
    phase: watch::Sender<ServerPhase>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        let (phase, _) = watch::channel(ServerPhase::Starting);
        Self {
            config: state.config.clone(),
            store: state.store.clone(),
            app: build_http_app(state),
            phase,
        }
    }

    /// Receives every phase change.
    pub fn subscribe(&self) -> watch::Receiver<ServerPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> ServerPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, next: ServerPhase) {
        let prev = self.phase.send_replace(next);
        tracing::debug!(from = ?prev, to = ?next, "Server phase changed");
    }

    /// Binds the configured `http_host:http_port`.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.listen_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow!("failed to bind {addr}: {e}"))
    }

    /// Serves `listener` until `shutdown` resolves, then drains and closes the
    /// database.
    ///
    /// After the signal the server waits `stop_delay_secs`, stops accepting
    /// connections and gives in-flight requests `graceful_timeout_secs` to
    /// finish. Whatever is still running after that is cancelled.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, self.app.clone().into_make_service())
            .with_graceful_shutdown(async move {
                let _ = drain_rx.await;
            });
        let mut server = tokio::spawn(async move { serve.await });

        self.set_phase(ServerPhase::Serving);
        tracing::info!(
            addr = %addr,
            request_timeout_secs = self.config.request_timeout_secs,
            idle_timeout_secs = self.config.idle_timeout_secs,
            "Starting the server"
        );

        let early_exit = tokio::select! {
            joined = &mut server => Some(joined),
            _ = shutdown => None,
        };

        if let Some(joined) = early_exit {
            tracing::error!("HTTP server exited before shutdown was requested");
            let outcome = server_outcome(joined);
            self.finish().await?;
            return outcome.and(Err(anyhow!("HTTP server stopped unexpectedly")));
        }

        self.set_phase(ServerPhase::Draining);
        tracing::info!(
            stop_delay_secs = self.config.stop_delay_secs,
            graceful_timeout_secs = self.config.graceful_timeout_secs,
            "Shutting down the server"
        );
        tokio::time::sleep(Duration::from_secs(self.config.stop_delay_secs)).await;
        let _ = drain_tx.send(());

        let grace = Duration::from_secs(self.config.graceful_timeout_secs);
        let drained = match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => server_outcome(joined),
            Err(_) => {
                tracing::warn!("Graceful shutdown timed out, cancelling remaining requests");
                server.abort();
                Ok(())
            }
        };

        self.finish().await?;
        drained?;
        tracing::info!("The server has been shut down");
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let closed = self.store.close().await;
        self.set_phase(ServerPhase::Stopped);
        closed.map_err(Into::into)
    }
}

fn server_outcome(joined: std::result::Result<std::io::Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(anyhow!("HTTP server error: {e}")),
        Err(e) => Err(anyhow!("HTTP server task failed: {e}")),
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::warn!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_config() -> ServerConfig {
        ServerConfig {
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
            graceful_timeout_secs: 2,
            ..ServerConfig::default()
        }
    }

    async fn test_server(dir: &tempfile::TempDir, config: ServerConfig) -> Server {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("lifecycle.db").display());
        let store = WorkerStore::connect(&url, chrono_tz::UTC, false)
            .await
            .unwrap();
        store.ensure_schema().await.unwrap();
        Server::new(AppState::new(store, config))
    }

    async fn wait_for(rx: &mut watch::Receiver<ServerPhase>, phase: ServerPhase) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| *p == phase))
            .await
            .expect("phase change timed out")
            .expect("phase channel closed");
    }

    #[tokio::test]
    async fn serves_until_signalled_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(&dir, local_config()).await;
        let store = server.store.clone();
        let mut phases = server.subscribe();
        assert_eq!(server.phase(), ServerPhase::Starting);

        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(listener, async move {
            let _ = stop_rx.await;
        }));

        wait_for(&mut phases, ServerPhase::Serving).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("Your API Server is up and running"));

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(*phases.borrow(), ServerPhase::Stopped);
        assert!(store.list_workers().await.is_err());
    }

    #[tokio::test]
    async fn stalled_request_is_cancelled_after_stop_delay_and_grace() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            stop_delay_secs: 1,
            graceful_timeout_secs: 1,
            ..local_config()
        };
        let server = test_server(&dir, config).await;
        let store = server.store.clone();
        let mut phases = server.subscribe();

        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(listener, async move {
            let _ = stop_rx.await;
        }));
        wait_for(&mut phases, ServerPhase::Serving).await;

        // Headers never finish, so the connection cannot drain on its own.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        stop_tx.send(()).unwrap();
        wait_for(&mut phases, ServerPhase::Draining).await;
        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("run did not return")
            .unwrap();
        let elapsed = started.elapsed();

        assert!(outcome.is_ok(), "{outcome:?}");
        assert!(elapsed >= Duration::from_millis(1900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        assert_eq!(*phases.borrow(), ServerPhase::Stopped);
        assert!(store.list_workers().await.is_err());
        drop(stream);
    }
}
