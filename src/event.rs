//! Log events as delivered by the host pipeline.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Host severity levels, ordered from most to least severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Operator console output.
    Console,
    /// Action must be taken immediately.
    Alert,
    /// Critical condition.
    Crit,
    /// Error condition.
    Err,
    /// Warning condition.
    Warning,
    /// Normal but significant condition.
    Notice,
    /// Informational message.
    Info,
    /// Debug-level message.
    Debug,
}

impl Level {
    /// Upper-case name used in rendered log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Console => "CONSOLE",
            Self::Alert => "ALERT",
            Self::Crit => "CRIT",
            Self::Err => "ERR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Whether an event at this level passes a sink bound with `threshold`.
    pub fn is_within(self, threshold: Level) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "alert" => Ok(Self::Alert),
            "crit" | "critical" => Ok(Self::Crit),
            "err" | "error" => Ok(Self::Err),
            "warning" | "warn" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" | "trace" => Ok(Self::Debug),
            _ => Err(()),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Err,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG | tracing::Level::TRACE => Self::Debug,
        }
    }
}

/// Where an event was produced, tagged when the event is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Emitted by the host or its other components.
    Host,
    /// Emitted by this crate's own diagnostics; never routed back into domain files.
    Internal,
}

/// Structured attributes attached to a call/session.
pub trait SessionContext: Send + Sync {
    /// Look up a named string attribute such as `domain_name`.
    fn variable(&self, name: &str) -> Option<&str>;

    /// Stable correlation identifier for the session, if one exists.
    fn uuid(&self) -> Option<&str>;
}

/// Owned session context backed by a variable map.
#[derive(Debug, Clone, Default)]
pub struct Session {
    uuid: Option<String>,
    variables: HashMap<String, String>,
}

impl Session {
    /// Create a session with a freshly generated v4 uuid.
    pub fn new() -> Self {
        Self {
            uuid: Some(uuid::Uuid::new_v4().to_string()),
            variables: HashMap::new(),
        }
    }

    /// Create a session without a correlation identifier.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Override the correlation identifier.
    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Attach a named attribute.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl SessionContext for Session {
    fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}

/// The host's internal message representation: a format message plus structured fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    /// Primary message text.
    pub message: String,
    /// Additional `key=value` fields, in emission order.
    pub fields: Vec<(String, String)>,
}

impl MessageBody {
    /// Body with a message and no fields.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Append a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

/// A single log event handed to sinks by the host.
#[derive(Clone, Copy)]
pub struct LogEvent<'a> {
    /// Producer tag used by the anti-recursion filter.
    pub origin: Origin,
    /// Severity the event was emitted at.
    pub level: Level,
    /// Source file, when known.
    pub file: Option<&'a str>,
    /// Enclosing function or module, when known.
    pub function: Option<&'a str>,
    /// Source line, zero when unknown.
    pub line: u32,
    /// Session the event belongs to, when any.
    pub session: Option<&'a dyn SessionContext>,
    /// Unrendered message.
    pub body: &'a MessageBody,
}

impl<'a> LogEvent<'a> {
    /// Host-origin event with no location or session.
    pub fn new(level: Level, body: &'a MessageBody) -> Self {
        Self {
            origin: Origin::Host,
            level,
            file: None,
            function: None,
            line: 0,
            session: None,
            body,
        }
    }

    /// Attach source location.
    #[must_use]
    pub fn with_location(mut self, file: &'a str, function: &'a str, line: u32) -> Self {
        self.file = Some(file);
        self.function = Some(function);
        self.line = line;
        self
    }

    /// Attach a session.
    #[must_use]
    pub fn with_session(mut self, session: &'a dyn SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Override the origin tag.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Debug for LogEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("origin", &self.origin)
            .field("level", &self.level)
            .field("file", &self.file)
            .field("function", &self.function)
            .field("line", &self.line)
            .field("session_uuid", &self.session.and_then(|s| s.uuid()))
            .field("body", self.body)
            .finish()
    }
}
