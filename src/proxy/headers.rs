use crate::proxy::error::{HeaderLimit, Peer, RelayError, RelayState};
use std::fmt::Display;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

const CRLF: &[u8] = b"\r\n";

/// A single header line with its line terminator removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine(String);

impl HeaderLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HeaderLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lines read from one side up to (not including) the blank line that ends them.
/// `terminated` records whether that blank line was seen or the stream ended first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    lines: Vec<HeaderLine>,
    terminated: bool,
}

impl HeaderBlock {
    pub fn new(lines: Vec<HeaderLine>, terminated: bool) -> Self {
        Self { lines, terminated }
    }

    pub fn lines(&self) -> &[HeaderLine] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [HeaderLine] {
        &mut self.lines
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(HeaderLine::new(line));
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && !self.terminated
    }

    /// Serialize with CRLF after every line, plus the blank line when terminated.
    pub fn encode(&self) -> Vec<u8> {
        let size = self.lines.iter().map(|l| l.0.len() + CRLF.len()).sum::<usize>() + CRLF.len();
        let mut out = Vec::with_capacity(size);
        for line in &self.lines {
            out.extend_from_slice(line.0.as_bytes());
            out.extend_from_slice(CRLF);
        }
        if self.terminated {
            out.extend_from_slice(CRLF);
        }
        out
    }
}

/// Reads one header block from a buffered stream while holding it to a line and byte budget.
pub struct HeaderReader<R> {
    inner: R,
    peer: Peer,
    max_lines: usize,
    max_bytes: usize,
    read_timeout: Option<Duration>,
}

impl<R> HeaderReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R, peer: Peer, max_lines: usize, max_bytes: usize, read_timeout: Option<Duration>) -> Self {
        Self { inner, peer, max_lines, max_bytes, read_timeout }
    }

    /// Read lines until a blank line or end-of-stream. `state` is the worker state reported on failure.
    pub async fn read_block(&mut self, state: RelayState) -> Result<HeaderBlock, RelayError> {
        let mut block = HeaderBlock::default();
        let mut used = 0usize;
        loop {
            let remaining = self.max_bytes.saturating_sub(used);
            let raw = match self.read_raw_line(remaining, state).await? {
                Some(raw) => raw,
                None => return Ok(block),
            };
            used += raw.len();
            if used > self.max_bytes {
                return Err(self.too_large(state, HeaderLimit::Bytes(self.max_bytes)));
            }

            let line = decode_line(&raw);
            if line.is_empty() {
                block.terminated = true;
                return Ok(block);
            }
            if block.lines.len() >= self.max_lines {
                return Err(self.too_large(state, HeaderLimit::Lines(self.max_lines)));
            }
            block.lines.push(HeaderLine(line));
        }
    }

    // Reads at most `remaining + 1` bytes so an over-budget line is detectable without
    // buffering more than the budget allows. `None` means end-of-stream.
    async fn read_raw_line(&mut self, remaining: usize, state: RelayState) -> Result<Option<Vec<u8>>, RelayError> {
        let mut buf = Vec::new();
        let limit = (remaining as u64).saturating_add(1);
        let peer = self.peer;
        let read_timeout = self.read_timeout;
        let inner = &mut self.inner;
        let read = async {
            let mut limited = (&mut *inner).take(limit);
            limited.read_until(b'\n', &mut buf).await
        };
        let result = match read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| RelayError::ReadTimeout { peer, state, timeout })?,
            None => read.await,
        };
        let n = result.map_err(|source| RelayError::Io { peer, state, source })?;
        if n == 0 { Ok(None) } else { Ok(Some(buf)) }
    }

    fn too_large(&self, state: RelayState, limit: HeaderLimit) -> RelayError {
        RelayError::HeaderBlockTooLarge { peer: self.peer, state, limit }
    }
}

// Strips LF or CRLF. Bytes that are not UTF-8 are replaced rather than rejected.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
