//! Per-event entry point: resolve a domain, format the line, and hand it to the cache.

use std::sync::Arc;

use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::cache::{CacheError, DomainCache};
use crate::domain::extract_domain;
use crate::event::{Level, LogEvent, Origin};
use crate::metrics::{MetricsSnapshot, RouterMetrics};
use crate::render::{MessageRenderer, truncate_to_boundary};
use crate::stream::LogSink;

/// Message written when no renderer is available or rendering fails.
pub const PLACEHOLDER_MESSAGE: &str = "(message)";

/// Default cap on a rendered message, in bytes.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1023;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const UNKNOWN: &str = "unknown";

/// Routes host log events into per-domain files.
///
/// `handle` never reports failure to its caller: every problem is logged and counted, and the
/// event is dropped.
pub struct LogRouter {
    cache: Arc<DomainCache>,
    renderer: Option<Arc<dyn MessageRenderer>>,
    max_message_bytes: usize,
    metrics: RouterMetrics,
}

impl LogRouter {
    /// Build a router over `cache`, rendering with `renderer` when the host provides one.
    pub fn new(
        cache: Arc<DomainCache>,
        renderer: Option<Arc<dyn MessageRenderer>>,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            cache,
            renderer,
            max_message_bytes,
            metrics: RouterMetrics::new(),
        }
    }

    /// Cache the router writes through.
    pub fn cache(&self) -> &Arc<DomainCache> {
        &self.cache
    }

    /// Current routing counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Route one event emitted at `level`.
    pub fn handle(&self, event: &LogEvent<'_>, level: Level) {
        if event.origin == Origin::Internal {
            self.metrics.record_internal();
            return;
        }

        let rendered = self.render(event);
        let Some(domain) = extract_domain(event.session, rendered.as_deref()) else {
            self.metrics.record_no_domain();
            return;
        };
        self.metrics.record_routed();

        let message = rendered.as_deref().unwrap_or(PLACEHOLDER_MESSAGE);
        let line = format_line(&timestamp_now(), level, event, message);

        let entry = match self.cache.get_or_create(&domain) {
            Ok(entry) => entry,
            Err(err) => {
                match err {
                    CacheError::Full { .. } => self.metrics.record_cache_full(),
                    CacheError::Open(_) => self.metrics.record_open_failure(),
                    CacheError::Closed => self.metrics.record_closed(),
                }
                tracing::warn!(domain = %domain, error = %err, "No cache entry for domain");
                return;
            }
        };

        match entry.write(line.as_bytes()) {
            Ok(report) => self
                .metrics
                .record_line(report.bytes as u64, report.reopened),
            Err(err) => {
                self.metrics.record_write_failure();
                tracing::error!(domain = %domain, error = %err, "Dropped domain log line");
            }
        }
    }

    /// Render through the negotiated capability. `None` means "use the placeholder".
    fn render(&self, event: &LogEvent<'_>) -> Option<String> {
        let renderer = self.renderer.as_ref()?;
        let mut rendered = match renderer.render(event) {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::debug!(error = %err, "Message render failed; using placeholder");
                return None;
            }
        };
        truncate_to_boundary(&mut rendered, self.max_message_bytes);
        let trimmed_len = rendered.trim_end_matches(['\r', '\n']).len();
        rendered.truncate(trimmed_len);
        (!rendered.is_empty()).then_some(rendered)
    }
}

impl LogSink for LogRouter {
    fn on_event(&self, event: &LogEvent<'_>, level: Level) {
        self.handle(event, level);
    }
}

impl std::fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRouter")
            .field("cache", &self.cache)
            .field("renderer", &self.renderer.is_some())
            .field("max_message_bytes", &self.max_message_bytes)
            .finish()
    }
}

/// Format one domain log line.
///
/// `<timestamp> [<LEVEL>] [<file>:<function>:<line>] <message> [<uuid>]`; the trailing uuid is
/// present only when the event belongs to a session.
pub fn format_line(timestamp: &str, level: Level, event: &LogEvent<'_>, message: &str) -> String {
    let file = event.file.unwrap_or(UNKNOWN);
    let function = event.function.unwrap_or(UNKNOWN);
    let line = event.line;
    match event.session {
        Some(session) => {
            let uuid = session.uuid().unwrap_or(UNKNOWN);
            format!("{timestamp} [{level}] [{file}:{function}:{line}] {message} [{uuid}]\n")
        }
        None => format!("{timestamp} [{level}] [{file}:{function}:{line}] {message}\n"),
    }
}

/// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`, UTC when the local offset is unknown.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "0000-00-00 00:00:00".to_string())
}
