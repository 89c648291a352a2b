use crate::proxy::relay::{RelaySettings, handle_connection};
use log::{trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Bounded set of relay workers. Dispatch never waits: each connection gets a task right away,
/// and that task queues (first come, first served) for one of `size` slots before relaying.
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
    settings: Arc<RelaySettings>,
}

impl WorkerPool {
    pub fn new(size: usize, settings: RelaySettings) -> Self {
        Self { slots: Arc::new(Semaphore::new(size)), size, settings: Arc::new(settings) }
    }

    pub fn dispatch(&self, client: TcpStream, peer_addr: SocketAddr) -> JoinHandle<()> {
        let slots = self.slots.clone();
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Worker pool closed, dropping connection from {}: {}", peer_addr, e);
                    return;
                }
            };
            trace!("Worker slot taken for {}", peer_addr);
            // Errors are already logged by the worker.
            let _ = handle_connection(client, peer_addr, &settings).await;
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a relaying worker.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_pool_limits_concurrent_workers() {
        // Backend that accepts but never answers, so every worker stays busy.
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();
        let held = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = backend.accept().await {
                held.push(stream);
            }
        });

        let config = Config::default().with_backend("127.0.0.1", backend_addr.port()).with_timeouts(Some(5), None);
        let pool = WorkerPool::new(2, RelaySettings::from(&config));
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.available(), 2);

        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let front_addr = front.local_addr().unwrap();
        let mut clients = Vec::new();
        for _ in 0..3 {
            let mut client = TcpStream::connect(front_addr).await.unwrap();
            client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
            clients.push(client);
            let (stream, peer) = front.accept().await.unwrap();
            pool.dispatch(stream, peer);
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.available(), 0);

        // Nothing was relayed back, and the third client is still waiting in line.
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_millis(100), clients[2].read(&mut buf)).await;
        assert!(read.is_err());
        held.abort();
    }
}
