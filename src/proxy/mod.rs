// Proxy module
//
// This module contains the relay proxy split into focused submodules:
// - acceptor: listen socket and accept loop
// - pool: bounded worker pool the acceptor dispatches into
// - relay: per-connection worker (request and response phases)
// - headers: header block reading and encoding
// - cookie: Set-Cookie Secure policy and auditing
// - error: relay error taxonomy

pub mod acceptor;
pub mod cookie;
pub mod error;
pub mod headers;
pub mod pool;
pub mod relay;

pub use acceptor::{Acceptor, start_proxy_server};
