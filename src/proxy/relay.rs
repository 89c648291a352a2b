use crate::config::Config;
use crate::proxy::cookie::{CookieAudit, CookieMatch, enforce_secure};
use crate::proxy::error::{Peer, RelayError, RelayState};
use crate::proxy::headers::{HeaderBlock, HeaderLine, HeaderReader};
use log::{debug, error, info, trace};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Headers telling the backend the client connection was TLS-terminated in front of it.
pub const FORWARDED_HEADERS: [&str; 3] = ["X-Forwarded-Proto: https", "X-Forwarded-Ssl: on", "X-Forwarded-Port: 443"];

/// Per-connection settings shared by every relay worker.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub backend_addr: String,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub max_header_lines: usize,
    pub max_header_bytes: usize,
    pub cookie_match: CookieMatch,
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            backend_addr: config.backend_addr(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            max_header_lines: config.get_max_header_lines(),
            max_header_bytes: config.get_max_header_bytes(),
            cookie_match: config.get_cookie_match(),
        }
    }
}

/// What a completed exchange did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub request_lines: usize,
    pub response_lines: usize,
    pub cookies_secured: usize,
}

/// Append the forwarded-protocol headers after the client's own lines and close the block.
pub fn forwarded_request(mut request: HeaderBlock) -> HeaderBlock {
    for header in FORWARDED_HEADERS {
        request.push(header);
    }
    request.set_terminated(true);
    request
}

/// Rewrite every `Set-Cookie` line that lacks `Secure`, in place. Returns how many changed.
pub fn secure_response(response: &mut HeaderBlock, mode: CookieMatch) -> usize {
    let mut rewritten = 0;
    for line in response.lines_mut() {
        if let Some(secured) = enforce_secure(line.as_str(), mode) {
            info!("Added Secure flag: {}", secured);
            *line = HeaderLine::new(secured);
            rewritten += 1;
        }
    }
    rewritten
}

/// Handle one accepted client end to end: open the backend, relay a single exchange,
/// and close both sides whatever happens. Failures are logged here and returned for callers
/// that want them; the client never receives an error response.
pub async fn handle_connection(mut client: TcpStream, peer_addr: SocketAddr, settings: &RelaySettings) -> Result<RelaySummary, RelayError> {
    info!("New connection from {}", peer_addr);
    trace!("{}: {}", peer_addr, RelayState::Accepted);

    let result = async {
        let mut backend = connect_backend(settings).await?;
        trace!("{}: {} ({})", peer_addr, RelayState::BackendConnected, settings.backend_addr);
        let outcome = relay_exchange(&mut client, &mut backend, settings).await;
        let _ = backend.shutdown().await;
        outcome
    }
    .await;

    let _ = client.shutdown().await;
    trace!("{}: {}", peer_addr, RelayState::Closed);

    match &result {
        Ok(summary) => debug!(
            "Closed connection from {}: {} request lines, {} response lines, {} cookies secured",
            peer_addr, summary.request_lines, summary.response_lines, summary.cookies_secured
        ),
        Err(e) => error!("Error handling client {}: {}", peer_addr, e),
    }
    result
}

async fn connect_backend(settings: &RelaySettings) -> Result<TcpStream, RelayError> {
    let addr = settings.backend_addr.as_str();
    let connect = TcpStream::connect(addr);
    let result = match settings.connect_timeout {
        Some(timeout) => tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| RelayError::ConnectTimeout { addr: addr.to_string(), timeout })?,
        None => connect.await,
    };
    result.map_err(|source| RelayError::BackendConnect { addr: addr.to_string(), source })
}

/// Relay one request header block to the backend and one response header block back.
/// Nothing past either blank line is forwarded: bodies and further exchanges are dropped.
pub async fn relay_exchange<C, B>(client: &mut C, backend: &mut B, settings: &RelaySettings) -> Result<RelaySummary, RelayError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let state = RelayState::BackendConnected;
    let request = HeaderReader::new(BufReader::new(&mut *client), Peer::Client, settings.max_header_lines, settings.max_header_bytes, settings.read_timeout)
        .read_block(state)
        .await?;
    let request_lines = request.lines().len();
    write_block(backend, &forwarded_request(request), Peer::Backend, state).await?;

    let state = RelayState::RequestRelayed;
    trace!("{} with {} client lines", state, request_lines);
    let mut response = HeaderReader::new(BufReader::new(&mut *backend), Peer::Backend, settings.max_header_lines, settings.max_header_bytes, settings.read_timeout)
        .read_block(state)
        .await?;

    let audit = CookieAudit::from_lines(response.lines().iter().map(HeaderLine::as_str), settings.cookie_match);
    if audit.missing_secure() {
        debug!("Backend set {} cookie(s) without the Secure flag", audit.count());
    }
    let cookies_secured = secure_response(&mut response, settings.cookie_match);
    write_block(client, &response, Peer::Client, state).await?;
    trace!("{}", RelayState::ResponseRelayed);

    Ok(RelaySummary { request_lines, response_lines: response.lines().len(), cookies_secured })
}

async fn write_block<W>(writer: &mut W, block: &HeaderBlock, peer: Peer, state: RelayState) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = block.encode();
    if bytes.is_empty() {
        return Ok(());
    }
    writer.write_all(&bytes).await.map_err(|source| RelayError::Io { peer, state, source })?;
    writer.flush().await.map_err(|source| RelayError::Io { peer, state, source })
}
