use crate::config::Config;
use crate::proxy::pool::WorkerPool;
use crate::proxy::relay::RelaySettings;
use anyhow::{Context, Result};
use log::{error, info, trace};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Listens on the proxy port and hands every accepted client to the worker pool.
pub struct Acceptor {
    listener: TcpListener,
    pool: WorkerPool,
}

impl Acceptor {
    /// Bind the listen socket. Failing here is fatal for the process.
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("Failed to bind proxy listener on {}", addr))?;
        let pool = WorkerPool::new(config.get_workers(), RelaySettings::from(config));
        Ok(Self { listener, pool })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Accept connections until the process ends. A failed accept only skips that attempt.
    pub async fn run(self) -> Result<()> {
        let local_addr = self.local_addr()?;
        info!(
            "Proxy listening on {} -> {} ({} workers)",
            local_addr,
            self.pool.settings().backend_addr,
            self.pool.size()
        );
        loop {
            match self.listener.accept().await {
                Ok((client, peer_addr)) => {
                    trace!("Accepted {} ({} worker slots free)", peer_addr, self.pool.available());
                    self.pool.dispatch(client, peer_addr);
                }
                Err(e) => {
                    error!("TCP accept error on {}: {}", local_addr, e);
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                }
            }
        }
    }
}

/// Bind and run the proxy described by `config`.
pub async fn start_proxy_server(config: &Config) -> Result<()> {
    Acceptor::bind(config).await?.run().await
}
