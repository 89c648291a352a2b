use crate::proxy::cookie::CookieMatch;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "./cookieshield.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub(crate) path: PathBuf,
    // Interface the proxy listens on
    #[serde(deserialize_with = "string_or_default", default = "default_listen_host")]
    pub(crate) listen_host: String,
    #[serde(deserialize_with = "u16_or_default", default = "default_listen_port")]
    pub(crate) listen_port: u16,
    // Application server that believes it is reached over plain HTTP
    #[serde(deserialize_with = "string_or_default", default = "default_backend_host")]
    pub(crate) backend_host: String,
    #[serde(deserialize_with = "u16_or_default", default = "default_backend_port")]
    pub(crate) backend_port: u16,
    // Number of connections relayed at the same time
    #[serde(deserialize_with = "usize_or_default", default = "default_workers")]
    pub(crate) workers: usize,
    #[serde(deserialize_with = "timeout_or_default", default = "default_connect_timeout")]
    pub(crate) connect_timeout_secs: Option<u64>,
    #[serde(deserialize_with = "timeout_or_default", default = "default_read_timeout")]
    pub(crate) read_timeout_secs: Option<u64>,
    #[serde(deserialize_with = "usize_or_default", default = "default_max_header_lines")]
    pub(crate) max_header_lines: usize,
    #[serde(deserialize_with = "usize_or_default", default = "default_max_header_bytes")]
    pub(crate) max_header_bytes: usize,
    #[serde(default)]
    pub(crate) cookie_match: CookieMatch,
}

/// Values given on the command line that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen_host: Option<String>,
    pub listen_port: Option<u16>,
    pub backend_host: Option<String>,
    pub backend_port: Option<u16>,
    pub workers: Option<usize>,
    pub cookie_match: Option<CookieMatch>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl Config {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().with_extension("json");
        Self {
            path,
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            backend_host: default_backend_host(),
            backend_port: default_backend_port(),
            workers: default_workers(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_header_lines: default_max_header_lines(),
            max_header_bytes: default_max_header_bytes(),
            cookie_match: CookieMatch::default(),
        }
    }

    /// Builder-style helper used by embedders and tests to point the proxy at a backend.
    pub fn with_backend(mut self, host: impl Into<String>, port: u16) -> Self {
        self.backend_host = host.into();
        self.backend_port = port;
        self
    }

    /// Builder-style helper used by embedders and tests to choose the listen socket.
    pub fn with_listen(mut self, host: impl Into<String>, port: u16) -> Self {
        self.listen_host = host.into();
        self.listen_port = port;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_header_limits(mut self, max_lines: usize, max_bytes: usize) -> Self {
        self.max_header_lines = max_lines;
        self.max_header_bytes = max_bytes;
        self
    }

    pub fn with_timeouts(mut self, connect_secs: Option<u64>, read_secs: Option<u64>) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self
    }

    pub fn with_cookie_match(mut self, mode: CookieMatch) -> Self {
        self.cookie_match = mode;
        self
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.listen_host {
            self.listen_host = host.clone();
        }
        if let Some(port) = overrides.listen_port {
            self.listen_port = port;
        }
        if let Some(host) = &overrides.backend_host {
            self.backend_host = host.clone();
        }
        if let Some(port) = overrides.backend_port {
            self.backend_port = port;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(mode) = overrides.cookie_match {
            self.cookie_match = mode;
        }
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    pub fn listen_addr(&self) -> String {
        join_host_port(&self.listen_host, self.listen_port)
    }

    pub fn backend_addr(&self) -> String {
        join_host_port(&self.backend_host, self.backend_port)
    }

    pub fn get_workers(&self) -> usize {
        self.workers
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_max_header_lines(&self) -> usize {
        self.max_header_lines
    }

    pub fn get_max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn get_cookie_match(&self) -> CookieMatch {
        self.cookie_match
    }
}

// IPv6 literals need brackets when a port is attached.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        writeln!(f, "{}", json)
    }
}

// Helper functions for deserialization
fn string_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match String::deserialize(deserializer) {
        Ok(s) => Ok(s),
        Err(e) => {
            warn!("Failed to deserialize string value: {}, using default", e);
            Ok(String::default())
        }
    }
}

// Forgiving u16: non-integer or out-of-range types fall back to 0, which validation rejects.
fn u16_or_default<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match u16::deserialize(deserializer) {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!("Failed to deserialize u16 value: {}, using default", e);
            Ok(u16::default())
        }
    }
}

fn usize_or_default<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match usize::deserialize(deserializer) {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!("Failed to deserialize integer value: {}, using default", e);
            Ok(usize::default())
        }
    }
}

// `null` disables the timeout; anything that is not a number disables it too.
fn timeout_or_default<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u64>::deserialize(deserializer) {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!("Failed to deserialize timeout value: {}, disabling timeout", e);
            Ok(None)
        }
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    9001
}

fn default_backend_host() -> String {
    "localhost".to_string()
}

fn default_backend_port() -> u16 {
    9000
}

fn default_workers() -> usize {
    10
}

fn default_connect_timeout() -> Option<u64> {
    Some(10)
}

fn default_read_timeout() -> Option<u64> {
    Some(30)
}

fn default_max_header_lines() -> usize {
    100
}

fn default_max_header_bytes() -> usize {
    64 * 1024
}
