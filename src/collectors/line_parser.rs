//! Structured field extraction for proxy access log lines
//!
//! The proxy writes whitespace separated `key=value` tokens. The watcher only
//! needs three of them, in this order:
//!
//! ```text
//! ... pool=blue release=v1.4.2 upstream_status=502 : 200 ...
//! ```
//!
//! `release=` is optional. `upstream_status` may hold several colon separated
//! codes when the proxy retried against another upstream; the last one is the
//! status the client actually received.

use crate::events::{LogRecord, NO_POOL_SENTINEL};
use regex::Regex;
use std::sync::LazyLock;

static ACCESS_LOG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\s)pool=(?P<pool>\S+)\s+(?:release=(?P<release>\S+)\s+)?upstream_status=(?P<status>[^\s:]+(?:\s*:\s*[^\s:]+)*)",
    )
    .expect("access log pattern is valid")
});

/// Parse one raw access log line
///
/// Returns `None` when the line lacks the watched fields. A `pool=-` token
/// yields a record without pool information; its status still counts.
///
/// # Examples
///
/// ```
/// use poolwatch::collectors::parse_line;
///
/// let record = parse_line("pool=green release=r7 upstream_status=502 : 200").unwrap();
/// assert_eq!(record.pool.as_deref(), Some("green"));
/// assert_eq!(record.status, 200);
///
/// assert!(parse_line("GET /healthz 200").is_none());
/// ```
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let captures = ACCESS_LOG_REGEX.captures(line)?;

    let pool = captures
        .name("pool")
        .map(|m| m.as_str())
        .filter(|pool| *pool != NO_POOL_SENTINEL)
        .map(str::to_string);
    let release = captures.name("release").map(|m| m.as_str().to_string());
    let status = captures
        .name("status")
        .map(|m| parse_upstream_status(m.as_str()))
        .unwrap_or(0);

    Some(LogRecord {
        pool,
        release,
        status,
    })
}

/// Take the last colon separated attempt, 0 if it is not a number
fn parse_upstream_status(raw: &str) -> u16 {
    raw.rsplit(':')
        .next()
        .map(str::trim)
        .and_then(|last| last.parse().ok())
        .unwrap_or(0)
}
