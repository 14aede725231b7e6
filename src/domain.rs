//! Domain key resolution from session attributes or rendered message text.

use std::fmt;

use crate::event::SessionContext;

/// Longest domain key kept after extraction, in characters.
pub const MAX_DOMAIN_LEN: usize = 127;

/// Session attributes consulted, in priority order.
const CONTEXT_ATTRIBUTES: [&str; 2] = ["domain_name", "domain"];

/// Message markers scanned, in priority order.
const TEXT_MARKERS: [&str; 2] = ["domain_name=", "domain="];

/// Tenant identifier used to pick a log file.
///
/// Always non-empty, never whitespace-only, at most [`MAX_DOMAIN_LEN`] characters, and safe to
/// splice into a single file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainKey(String);

impl DomainKey {
    /// Validate and truncate a raw value into a key.
    ///
    /// Returns `None` for empty or whitespace-only input and for values that would escape the log
    /// directory (path separators, NUL, `.` or `..`).
    pub fn new(raw: &str) -> Option<Self> {
        let truncated: String = raw.chars().take(MAX_DOMAIN_LEN).collect();
        if truncated.trim().is_empty() {
            return None;
        }
        if truncated == "." || truncated == ".." {
            return None;
        }
        if truncated.contains(['/', '\\', '\0']) {
            return None;
        }
        Some(Self(truncated))
    }

    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve a domain, preferring the session over the rendered text.
pub fn extract_domain(
    session: Option<&dyn SessionContext>,
    text: Option<&str>,
) -> Option<DomainKey> {
    session
        .and_then(extract_domain_from_context)
        .or_else(|| text.and_then(extract_domain_from_text))
}

/// Read `domain_name`, then `domain`, from a session.
pub fn extract_domain_from_context(session: &dyn SessionContext) -> Option<DomainKey> {
    CONTEXT_ATTRIBUTES
        .iter()
        .filter_map(|name| session.variable(name))
        .find_map(DomainKey::new)
}

/// Scan text for `domain_name=VALUE`, then `domain=VALUE`.
///
/// Only the first occurrence of each marker is considered. The value runs until whitespace, a
/// control character, or the end of the text.
pub fn extract_domain_from_text(text: &str) -> Option<DomainKey> {
    let rest = TEXT_MARKERS.iter().find_map(|marker| {
        text.find(marker).map(|start| &text[start + marker.len()..])
    })?;

    let end = rest
        .find(|c: char| c.is_whitespace() || c.is_control())
        .unwrap_or(rest.len());
    let value = &rest[..end];
    if value.is_empty() {
        return None;
    }
    DomainKey::new(value)
}
