use crate::config::types::Config;
use crate::utils::validation::{is_empty_or_whitespace, validate_host_chars, validate_non_zero, validate_port_range};
use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;

impl Config {
    /// Check that the configuration describes a proxy that can actually start.
    pub fn validate(&self) -> Result<()> {
        if is_empty_or_whitespace(&self.listen_host) || !validate_host_chars(&self.listen_host) {
            return Err(anyhow!("Invalid listen host: '{}'", self.listen_host));
        }
        if is_empty_or_whitespace(&self.backend_host) || !validate_host_chars(&self.backend_host) {
            return Err(anyhow!("Invalid backend host: '{}'", self.backend_host));
        }
        validate_port_range(self.listen_port).map_err(|e| anyhow!("Invalid listen port: {}", e))?;
        validate_port_range(self.backend_port).map_err(|e| anyhow!("Invalid backend port: {}", e))?;
        validate_non_zero("workers", self.workers).map_err(|e| anyhow!(e))?;
        if self.workers > Semaphore::MAX_PERMITS {
            return Err(anyhow!("workers must be at most {}, got {}", Semaphore::MAX_PERMITS, self.workers));
        }
        validate_non_zero("max_header_lines", self.max_header_lines).map_err(|e| anyhow!(e))?;
        validate_non_zero("max_header_bytes", self.max_header_bytes).map_err(|e| anyhow!(e))?;
        if self.connect_timeout_secs == Some(0) {
            return Err(anyhow!("connect_timeout_secs must be at least 1, or null to disable"));
        }
        if self.read_timeout_secs == Some(0) {
            return Err(anyhow!("read_timeout_secs must be at least 1, or null to disable"));
        }
        Ok(())
    }
}
