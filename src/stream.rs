//! Host log-event stream: sink registration and in-process dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::event::{Level, LogEvent};

/// Receiver of host log events.
pub trait LogSink: Send + Sync {
    /// Handle one event emitted at `level`. Must not panic or block indefinitely.
    fn on_event(&self, event: &LogEvent<'_>, level: Level);
}

/// Handle returned by [`LogStream::bind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// Host-side registry of log sinks.
pub trait LogStream: Send + Sync {
    /// Subscribe `sink` to events at `min_level` or more severe.
    fn bind(&self, sink: Arc<dyn LogSink>, min_level: Level) -> SinkId;

    /// Unsubscribe a sink. Returns whether it was bound.
    ///
    /// Once this returns, the sink receives no further events.
    fn unbind(&self, id: SinkId) -> bool;
}

struct Binding {
    id: SinkId,
    min_level: Level,
    sink: Arc<dyn LogSink>,
}

/// In-process [`LogStream`].
///
/// Dispatch holds a shared lock while sinks run and `unbind` takes it exclusively, so unbinding
/// waits out any delivery already in progress.
#[derive(Default)]
pub struct LogBus {
    next_id: AtomicU64,
    bindings: RwLock<Vec<Binding>>,
}

impl LogBus {
    /// Create a bus with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every sink whose minimum level admits it.
    pub fn dispatch(&self, event: &LogEvent<'_>) {
        // Sinks may emit diagnostics that loop back into dispatch on this thread.
        let bindings = self.bindings.read_recursive();
        for binding in bindings.iter() {
            if event.level.is_within(binding.min_level) {
                binding.sink.on_event(event, event.level);
            }
        }
    }

    /// Number of bound sinks.
    pub fn sink_count(&self) -> usize {
        self.bindings.read_recursive().len()
    }
}

impl LogStream for LogBus {
    fn bind(&self, sink: Arc<dyn LogSink>, min_level: Level) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.bindings.write().push(Binding {
            id,
            min_level,
            sink,
        });
        id
    }

    fn unbind(&self, id: SinkId) -> bool {
        let mut bindings = self.bindings.write();
        let before = bindings.len();
        bindings.retain(|binding| binding.id != id);
        bindings.len() != before
    }
}

impl std::fmt::Debug for LogBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBus")
            .field("sinks", &self.sink_count())
            .finish()
    }
}
