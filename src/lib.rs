#![deny(missing_docs)]

//! Routes log events into per-domain append-only files through a bounded cache of open handles.

/// `tracing` layer that feeds events into the host stream.
pub mod bridge;
/// Domain-keyed cache of open log files.
pub mod cache;
/// Environment-driven configuration management.
pub mod config;
/// Domain key extraction.
pub mod domain;
/// Per-domain file handle and write protocol.
pub mod entry;
/// Host log event model.
pub mod event;
/// Module load and shutdown.
pub mod lifecycle;
/// Structured logging and tracing setup.
pub mod logging;
/// Routing counters.
pub mod metrics;
/// Optional message rendering capability.
pub mod render;
/// Per-event routing and line formatting.
pub mod router;
/// Host log stream subscription.
pub mod stream;

pub use cache::{CacheError, DomainCache};
pub use domain::{DomainKey, extract_domain, extract_domain_from_context, extract_domain_from_text};
pub use entry::{FileEntry, WriteError, WriteReport};
pub use event::{Level, LogEvent, MessageBody, Origin, Session, SessionContext};
pub use lifecycle::{DomainLogModule, LifecycleError, ShutdownReport};
pub use render::{HostCapabilities, MessageRenderer, PlainRenderer};
pub use router::LogRouter;
pub use stream::{LogBus, LogSink, LogStream, SinkId};
