//! Load and shutdown of the domain log module.
//!
//! [`DomainLogModule`] owns the cache and router for one load/unload cycle and keeps their
//! ordering explicit: the router is bound to the host stream only after the cache exists, and
//! shutdown unbinds before it drains.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::cache::DomainCache;
use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::render::HostCapabilities;
use crate::router::LogRouter;
use crate::stream::{LogStream, SinkId};

/// Name of the marker file written to the log directory at load.
pub const MARKER_FILE: &str = "domainlog_loaded";

const MARKER_CONTENTS: &str = "domainlog loaded\n";

/// Errors that prevent the module from loading.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The configured cache capacity cannot admit any domain.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
}

/// Summary returned by [`DomainLogModule::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Domains cached at shutdown.
    pub domains: usize,
    /// Handles that were still open and got closed.
    pub closed_handles: usize,
    /// Final routing counters.
    pub metrics: MetricsSnapshot,
}

/// A loaded router bound to a host log stream.
pub struct DomainLogModule {
    stream: Arc<dyn LogStream>,
    sink_id: Option<SinkId>,
    cache: Arc<DomainCache>,
    router: Arc<LogRouter>,
}

impl DomainLogModule {
    /// Build an empty cache, negotiate capabilities, and bind the router to `stream`.
    pub fn load(
        config: &Config,
        stream: Arc<dyn LogStream>,
        capabilities: &HostCapabilities,
    ) -> Result<Self, LifecycleError> {
        if config.cache_capacity == 0 {
            return Err(LifecycleError::ZeroCapacity);
        }

        if let Err(err) = fs::create_dir_all(&config.log_dir) {
            tracing::warn!(
                log_dir = %config.log_dir.display(),
                error = %err,
                "Failed to create log directory"
            );
        }

        let cache = Arc::new(DomainCache::new(
            config.log_dir.clone(),
            config.cache_capacity,
            config.roll_size,
        ));

        let renderer = capabilities.renderer();
        if renderer.is_some() {
            tracing::info!("Message renderer available");
        } else {
            tracing::info!("Message renderer not available; using placeholder");
        }

        let router = Arc::new(LogRouter::new(
            Arc::clone(&cache),
            renderer,
            config.max_message_bytes,
        ));
        let sink_id = stream.bind(router.clone(), config.min_level);

        if config.write_marker {
            write_marker(&config.log_dir);
        }

        tracing::info!(
            log_dir = %config.log_dir.display(),
            capacity = config.cache_capacity,
            "Domain-specific logging enabled"
        );

        Ok(Self {
            stream,
            sink_id: Some(sink_id),
            cache,
            router,
        })
    }

    /// The cache shared with the router.
    pub fn cache(&self) -> &Arc<DomainCache> {
        &self.cache
    }

    /// The router bound to the host stream.
    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    /// Unbind from the stream, then close every cached file.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> ShutdownReport {
        let domains = self.cache.len();
        if let Some(id) = self.sink_id.take() {
            tracing::info!(domains, "Shutting down domain logging");
            self.stream.unbind(id);
        }
        let closed_handles = self.cache.drain();
        ShutdownReport {
            domains,
            closed_handles,
            metrics: self.router.metrics_snapshot(),
        }
    }
}

impl Drop for DomainLogModule {
    fn drop(&mut self) {
        if self.sink_id.is_some() {
            self.teardown();
        }
    }
}

impl std::fmt::Debug for DomainLogModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainLogModule")
            .field("sink_id", &self.sink_id)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Path of the load marker inside `log_dir`.
pub fn marker_path(log_dir: &Path) -> PathBuf {
    log_dir.join(MARKER_FILE)
}

fn write_marker(log_dir: &Path) {
    let path = marker_path(log_dir);
    if let Err(err) = fs::write(&path, MARKER_CONTENTS) {
        tracing::warn!(path = %path.display(), error = %err, "Could not write marker file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainKey;
    use crate::event::{Level, LogEvent, MessageBody, Session};
    use crate::render::PlainRenderer;
    use crate::stream::LogBus;

    fn key(name: &str) -> DomainKey {
        DomainKey::new(name).unwrap()
    }

    fn config(dir: &Path) -> Config {
        Config {
            log_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn load_binds_and_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(LogBus::new());
        let module = DomainLogModule::load(
            &config(dir.path()),
            bus.clone(),
            &HostCapabilities::with_renderer(PlainRenderer),
        )
        .unwrap();

        assert_eq!(bus.sink_count(), 1);
        assert!(module.cache().is_empty());
        assert_eq!(
            fs::read_to_string(marker_path(dir.path())).unwrap(),
            "domainlog loaded\n"
        );
    }

    #[test]
    fn load_creates_missing_log_dir_and_can_skip_marker() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let config = Config {
            write_marker: false,
            ..config(&nested)
        };
        let _module =
            DomainLogModule::load(&config, Arc::new(LogBus::new()), &HostCapabilities::none())
                .unwrap();
        assert!(nested.is_dir());
        assert!(!marker_path(&nested).exists());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_capacity: 0,
            ..config(dir.path())
        };
        let result =
            DomainLogModule::load(&config, Arc::new(LogBus::new()), &HostCapabilities::none());
        assert!(matches!(result, Err(LifecycleError::ZeroCapacity)));
    }

    #[test]
    fn shutdown_unbinds_then_closes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(LogBus::new());
        let module = DomainLogModule::load(
            &config(dir.path()),
            bus.clone(),
            &HostCapabilities::with_renderer(PlainRenderer),
        )
        .unwrap();

        for domain in ["a.com", "b.com"] {
            let session = Session::new().with_variable("domain_name", domain);
            let body = MessageBody::text("hello");
            bus.dispatch(&LogEvent::new(Level::Info, &body).with_session(&session));
        }
        let entry = module.cache().get_or_create(&key("a.com")).unwrap();
        let cache = Arc::clone(module.cache());

        let report = module.shutdown();
        assert_eq!(report.domains, 2);
        assert_eq!(report.closed_handles, 2);
        assert_eq!(report.metrics.lines_written, 2);
        assert_eq!(bus.sink_count(), 0);
        assert!(!entry.is_open());
        assert!(cache.is_empty());

        let session = Session::new().with_variable("domain_name", "a.com");
        let body = MessageBody::text("after shutdown");
        bus.dispatch(&LogEvent::new(Level::Info, &body).with_session(&session));
        assert!(entry.write(b"late\n").is_err());
        let contents = fs::read_to_string(dir.path().join("domain_a.com.log")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn drop_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(LogBus::new());
        let module =
            DomainLogModule::load(&config(dir.path()), bus.clone(), &HostCapabilities::none())
                .unwrap();
        let cache = Arc::clone(module.cache());
        drop(module);
        assert_eq!(bus.sink_count(), 0);
        assert!(cache.get_or_create(&key("x")).is_err());
    }
}
