use actix_web::dev::ServerHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handles graceful shutdown of the application
///
/// This module orchestrates graceful shutdown by:
/// 1. Listening for shutdown signals (SIGTERM, SIGINT/CTRL+C)
/// 2. Stopping the HTTP server (stops accepting new requests)
/// 3. Signaling the scheduler to stop arming new fetches
/// 4. Waiting for the scheduler task to finish
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    scheduler_handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        scheduler_handle: JoinHandle<()>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            scheduler_handle,
            shutdown_tx,
        }
    }

    /// Wait for shutdown signal and perform graceful shutdown
    ///
    /// Blocks until CTRL+C or, on Unix, SIGTERM is received.
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for CTRL+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    /// Perform the actual shutdown sequence
    async fn shutdown(self) -> Result<(), std::io::Error> {
        // 1. Stop HTTP server (stop accepting new requests)
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        // 2. Signal the scheduler; a fetch already running is left to finish
        info!("Signaling job scheduler to stop...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal to scheduler: {:?}", e);
        }

        // 3. Wait for the scheduler task
        match self.scheduler_handle.await {
            Ok(()) => info!("Job scheduler stopped"),
            Err(e) => error!("Job scheduler failed to stop: {:?}", e),
        }

        // 4. Wait for HTTP server task to complete
        info!("Waiting for HTTP server to fully shut down...");
        let result = match self.server_task.await {
            Ok(Ok(())) => {
                info!("HTTP server shut down successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("HTTP server encountered error during shutdown: {:?}", e);
                Err(e)
            }
            Err(e) => {
                error!("HTTP server task panicked: {:?}", e);
                Ok(())
            }
        };

        info!("Graceful shutdown completed");
        result
    }
}
