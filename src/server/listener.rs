//! TCP server: accept loop and shutdown wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::server::connection::Connection;
use crate::server::handler::Handler;
use crate::store::StreamRegistry;

/// The Brook TCP server.
///
/// Owns the listener, the stream registry, and the shutdown channel.
/// Every accepted connection runs in its own task; a ctrl-c posts a
/// shutdown intent over the broadcast channel rather than tearing
/// anything down directly.
pub struct Server {
    config: Config,
    listener: TcpListener,
    registry: Arc<StreamRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the listener and build a server from the configuration
    pub async fn new(config: Config) -> Result<Self> {
        let addr = config.server.address();
        let listener = TcpListener::bind(&addr).await?;

        info!("Server listening on {}", addr);

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            listener,
            registry: Arc::new(StreamRegistry::new()),
            shutdown_tx,
        })
    }

    /// The address the listener actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The registry this server serves
    pub fn registry(&self) -> Arc<StreamRegistry> {
        self.registry.clone()
    }

    /// A sender that triggers shutdown when fired
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the server until ctrl-c or a shutdown signal
    pub async fn run(self) -> Result<()> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        });

        self.accept_loop().await
    }

    async fn accept_loop(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let limits = self.config.limits.parser_limits();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);

                            let connection = Connection::with_limits(stream, limits.clone());
                            let handler = Handler::new(
                                connection,
                                self.registry.clone(),
                                self.shutdown_tx.subscribe(),
                            );

                            tokio::spawn(async move {
                                if let Err(e) = handler.run().await {
                                    warn!("Connection error from {}: {}", addr, e);
                                }
                                debug!("Client {} disconnected", addr);
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
