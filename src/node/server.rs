//! Node assembly: stats store, cluster, registry, HTTP listener, heartbeat

use crate::cluster::{Cluster, Heartbeat, HttpTransport, PeerTransport};
use crate::common::{NodeConfig, Result};
use crate::game::{MemoryStatsStore, SledStatsStore, StatsStore};
use crate::node::http::create_router;
use crate::node::NodeContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Node {
    config: NodeConfig,
    transport: Arc<dyn PeerTransport>,
}

/// A node whose listener and heartbeat are running.
pub struct NodeHandle {
    pub context: NodeContext,
    pub local_addr: SocketAddr,
    heartbeat: Heartbeat,
    stop: watch::Sender<bool>,
    server: Option<JoinHandle<std::io::Result<()>>>,
    durable: Option<Arc<SledStatsStore>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            transport: Arc::new(HttpTransport::new()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Bind the configured address and run until Ctrl-C/SIGTERM or a
    /// server error.
    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting node: {}", self.config.address);
        tracing::info!("  Rank: {}", self.config.rank);
        tracing::info!("  Bind: {}", self.config.bind_addr);
        tracing::info!("  Bootstrap: {}", self.config.bootstrap_address());
        tracing::info!("  Heartbeat: {}ms", self.config.heartbeat_interval_ms);

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let mut handle = self.start(listener).await?;
        let Some(mut server) = handle.server.take() else {
            return Ok(());
        };

        let server_exited = tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received");
                false
            }
            res = &mut server => {
                match res {
                    Ok(Ok(())) => tracing::warn!("HTTP server exited"),
                    Ok(Err(e)) => tracing::error!("HTTP server error: {}", e),
                    Err(e) => tracing::error!("HTTP server task failed: {}", e),
                }
                true
            }
        };
        if !server_exited {
            handle.server = Some(server);
        }

        handle.shutdown().await;
        Ok(())
    }

    /// Serve on an already-bound listener, sync the peer table from the
    /// bootstrap node and start the heartbeat.
    pub async fn start(self, listener: TcpListener) -> Result<NodeHandle> {
        let (stats, durable) = match &self.config.stats_path {
            Some(path) => {
                tracing::info!("Opening stats store at {}", path.display());
                let store = Arc::new(SledStatsStore::open(path)?);
                (store.clone() as Arc<dyn StatsStore>, Some(store))
            }
            None => (Arc::new(MemoryStatsStore::new()) as Arc<dyn StatsStore>, None),
        };

        let cluster = Arc::new(Cluster::from_config(&self.config, self.transport.clone()));
        let context = NodeContext::new(cluster.clone(), stats);

        let local_addr = listener.local_addr()?;
        let (stop, mut stopped) = watch::channel(false);
        let router = create_router(context.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    while !*stopped.borrow() {
                        if stopped.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await
        });
        tracing::info!("[{}] listening on {}", cluster.address(), local_addr);

        cluster.fetch_peer_table(&self.config.bootstrap_address()).await;
        let heartbeat = Heartbeat::start(cluster.clone(), self.config.heartbeat_interval());

        tracing::info!("✓ Node ready ({}, coordinator {})", cluster.role(), cluster.coordinator());

        Ok(NodeHandle {
            context,
            local_addr,
            heartbeat,
            stop,
            server: Some(server),
            durable,
        })
    }
}

impl NodeHandle {
    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.context.cluster
    }

    /// Stop the heartbeat, drain the listener and flush persistent stats.
    pub async fn shutdown(self) {
        self.heartbeat.shutdown().await;
        let _ = self.stop.send(true);
        if let Some(server) = self.server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("HTTP server error during shutdown: {}", e),
                Err(e) => tracing::warn!("HTTP server task failed: {}", e),
            }
        }
        if let Some(store) = self.durable {
            if let Err(e) = store.flush() {
                tracing::error!("Failed to flush stats store: {}", e);
            }
        }
        tracing::info!("Node shut down");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
