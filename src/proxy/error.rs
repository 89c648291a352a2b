use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Where a relay worker is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Accepted,
    BackendConnected,
    RequestRelayed,
    ResponseRelayed,
    Closed,
}

impl Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelayState::Accepted => "ACCEPTED",
            RelayState::BackendConnected => "BACKEND_CONNECTED",
            RelayState::RequestRelayed => "REQUEST_RELAYED",
            RelayState::ResponseRelayed => "RESPONSE_RELAYED",
            RelayState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Which side of the connection pair an I/O failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Client,
    Backend,
}

impl Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Client => f.write_str("client"),
            Peer::Backend => f.write_str("backend"),
        }
    }
}

/// The budget a header block ran over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLimit {
    Lines(usize),
    Bytes(usize),
}

impl Display for HeaderLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderLimit::Lines(n) => write!(f, "{} lines", n),
            HeaderLimit::Bytes(n) => write!(f, "{} bytes", n),
        }
    }
}

/// Every way a single relayed connection can be abandoned. None of these reach the client
/// as a response; the client only sees its connection close.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect to backend {addr}: {source}")]
    BackendConnect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {timeout:?} connecting to backend {addr}")]
    ConnectTimeout { addr: String, timeout: Duration },
    #[error("timed out after {timeout:?} reading from {peer} in state {state}")]
    ReadTimeout { peer: Peer, state: RelayState, timeout: Duration },
    #[error("{peer} header block exceeded {limit} in state {state}")]
    HeaderBlockTooLarge { peer: Peer, state: RelayState, limit: HeaderLimit },
    #[error("I/O error on {peer} in state {state}: {source}")]
    Io {
        peer: Peer,
        state: RelayState,
        #[source]
        source: std::io::Error,
    },
}
