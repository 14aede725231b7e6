//! Optional message rendering capability negotiated with the host at load time.

use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;

use crate::event::LogEvent;

/// Errors raised while rendering an event's message.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The event's message representation could not be turned into text.
    #[error("failed to render message: {0}")]
    Failed(String),
}

/// Host function that renders an event's internal message into plain text.
pub trait MessageRenderer: Send + Sync {
    /// Render the message of `event`.
    fn render(&self, event: &LogEvent<'_>) -> Result<String, RenderError>;
}

/// Renders the message followed by its fields as ` key=value` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl MessageRenderer for PlainRenderer {
    fn render(&self, event: &LogEvent<'_>) -> Result<String, RenderError> {
        let body = event.body;
        let mut rendered = body.message.clone();
        for (key, value) in &body.fields {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            write!(rendered, "{key}={value}").map_err(|err| RenderError::Failed(err.to_string()))?;
        }
        Ok(rendered)
    }
}

/// Optional functions the host may or may not provide.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    renderer: Option<Arc<dyn MessageRenderer>>,
}

impl HostCapabilities {
    /// No optional capabilities; every message renders as the placeholder.
    pub fn none() -> Self {
        Self::default()
    }

    /// Capabilities with a message renderer.
    pub fn with_renderer(renderer: impl MessageRenderer + 'static) -> Self {
        Self {
            renderer: Some(Arc::new(renderer)),
        }
    }

    /// The negotiated renderer, if the host offers one.
    pub fn renderer(&self) -> Option<Arc<dyn MessageRenderer>> {
        self.renderer.clone()
    }
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_to_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
