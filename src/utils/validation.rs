//! Common validation utilities shared across modules

/// Validate that a port number is in valid range (1-65535)
pub fn validate_port_range(port: u16) -> Result<(), String> {
    if port == 0 {
        return Err("Port must be between 1 and 65535".to_string());
    }
    Ok(())
}

/// Check if a string is empty or only whitespace
pub fn is_empty_or_whitespace(s: &str) -> bool {
    s.trim().is_empty()
}

/// Validate that a host name or address doesn't contain invalid characters
pub fn validate_host_chars(host: &str) -> bool {
    !host.is_empty()
        && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ':' || c == '[' || c == ']')
        && !host.starts_with('-')
        && !host.ends_with('-')
}

/// Validate that a limit is at least one
pub fn validate_non_zero(name: &str, value: usize) -> Result<(), String> {
    if value == 0 {
        return Err(format!("{} must be at least 1", name));
    }
    Ok(())
}
