//! `Set-Cookie` policy: spotting cookie headers, forcing the `Secure` attribute
//! onto them, and auditing which flags a response's cookies carry.

use serde::{Deserialize, Serialize};

const SET_COOKIE_PREFIX: &str = "set-cookie:";
const SECURE_SUFFIX: &str = "; Secure";

/// How a `Set-Cookie` line is judged to already carry the `Secure` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieMatch {
    /// `secure` appears anywhere in the line, in any case. A cookie value that
    /// happens to contain the word counts as secure.
    #[default]
    Substring,
    /// A `;`-separated attribute named exactly `Secure` (any case). Opt-in: this
    /// changes which lines get rewritten compared to `Substring`.
    Attribute,
}

/// Case-insensitive `Set-Cookie:` prefix test on a raw header line.
pub fn is_set_cookie(line: &str) -> bool {
    line.len() >= SET_COOKIE_PREFIX.len()
        && line.as_bytes()[..SET_COOKIE_PREFIX.len()].eq_ignore_ascii_case(SET_COOKIE_PREFIX.as_bytes())
}

pub fn has_secure_flag(line: &str, mode: CookieMatch) -> bool {
    match mode {
        CookieMatch::Substring => line.to_ascii_lowercase().contains("secure"),
        CookieMatch::Attribute => has_attribute(line, "secure"),
    }
}

pub fn has_http_only_flag(line: &str, mode: CookieMatch) -> bool {
    match mode {
        CookieMatch::Substring => line.to_ascii_lowercase().contains("httponly"),
        CookieMatch::Attribute => has_attribute(line, "httponly"),
    }
}

// The first `;` segment is the name=value pair and never an attribute.
fn has_attribute(line: &str, name: &str) -> bool {
    line.split(';').skip(1).any(|attr| {
        let attr_name = attr.split('=').next().unwrap_or("");
        attr_name.trim().eq_ignore_ascii_case(name)
    })
}

/// Returns the rewritten line when `line` is a `Set-Cookie` header lacking `Secure`.
/// Lines that need no change yield `None`, so applying this twice never stacks suffixes.
pub fn enforce_secure(line: &str, mode: CookieMatch) -> Option<String> {
    if !is_set_cookie(line) || has_secure_flag(line, mode) {
        return None;
    }
    Some(format!("{}{}", line, SECURE_SUFFIX))
}

/// Flags observed on a single `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieFlags {
    pub header: String,
    pub secure: bool,
    pub http_only: bool,
}

/// Summary of the cookies a response tried to set, for diagnostics and health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieAudit {
    pub cookies: Vec<CookieFlags>,
}

impl CookieAudit {
    /// Inspect every `Set-Cookie` line among `lines`, ignoring everything else.
    pub fn from_lines<'a, I>(lines: I, mode: CookieMatch) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let cookies = lines
            .into_iter()
            .filter(|line| is_set_cookie(line))
            .map(|line| CookieFlags {
                header: line.to_string(),
                secure: has_secure_flag(line, mode),
                http_only: has_http_only_flag(line, mode),
            })
            .collect();
        Self { cookies }
    }

    pub fn count(&self) -> usize {
        self.cookies.len()
    }

    pub fn any_secure(&self) -> bool {
        self.cookies.iter().any(|c| c.secure)
    }

    pub fn any_http_only(&self) -> bool {
        self.cookies.iter().any(|c| c.http_only)
    }

    /// Cookies were set but not one of them carries `Secure`.
    pub fn missing_secure(&self) -> bool {
        !self.cookies.is_empty() && !self.any_secure()
    }

    pub fn insecure(&self) -> impl Iterator<Item = &CookieFlags> {
        self.cookies.iter().filter(|c| !c.secure)
    }
}
