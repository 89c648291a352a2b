//! Shared helpers for end-to-end relay tests.

use cookieshield::config::Config;
use cookieshield::proxy::Acceptor;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Proxy config pointing at `backend`, listening on an ephemeral loopback port.
pub fn proxy_config(backend: SocketAddr) -> Config {
    Config::default()
        .with_listen("127.0.0.1", 0)
        .with_backend("127.0.0.1", backend.port())
        .with_timeouts(Some(2), Some(2))
}

/// Bind and run a proxy in the background, returning the address clients should use.
pub async fn start_proxy(config: Config) -> SocketAddr {
    let acceptor = Acceptor::bind(&config).await.unwrap();
    let addr = acceptor.local_addr().unwrap();
    tokio::spawn(acceptor.run());
    addr
}

/// Start a mock backend that records each request header block it receives, then answers
/// with `response` and closes its side.
pub async fn start_backend(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve_backend(listener, response, Duration::ZERO))
}

/// Like `start_backend`, but waits `delay` before answering each request.
pub async fn start_slow_backend(response: &'static [u8], delay: Duration) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, serve_backend(listener, response, delay))
}

/// Serve on an already-bound listener.
pub fn serve_backend(listener: TcpListener, response: &'static [u8], delay: Duration) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_header_block(&mut socket).await;
                let _ = tx.send(request);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    rx
}

/// Read until the first blank line (CRLF CRLF) or end-of-stream.
pub async fn read_header_block(socket: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    data
}

/// Send `request` through the proxy and collect everything sent back until the proxy closes.
pub async fn exchange(proxy: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request).await.unwrap();
    read_until_closed(&mut client).await
}

/// Collect bytes until EOF. A reset also counts as closed.
pub async fn read_until_closed(client: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => return data,
            Ok(Ok(n)) => data.extend_from_slice(&buf[..n]),
            Err(_) => panic!("proxy did not close the client connection"),
        }
    }
}
