//! Bridge from `tracing` to the host log stream.
//!
//! Span fields stand in for session variables: an event inside
//! `info_span!("call", domain_name = "acme.com", uuid = %id)` resolves to `acme.com` and is
//! correlated with `id`. Event fields other than `message` travel in the [`MessageBody`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::event::{Level, LogEvent, MessageBody, Origin, SessionContext};
use crate::stream::LogBus;

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Span fields that make an enclosing span count as a session.
const SESSION_FIELDS: [&str; 3] = ["uuid", "domain_name", "domain"];

/// A tracing layer that forwards every event to a [`LogBus`].
pub struct TracingBridge {
    bus: Arc<LogBus>,
}

impl TracingBridge {
    /// Forward events to `bus`.
    pub fn new(bus: Arc<LogBus>) -> Self {
        Self { bus }
    }
}

impl<S> Layer<S> for TracingBridge
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => values.record(fields),
            None => {
                let mut fields = SpanFields::default();
                values.record(&mut fields);
                extensions.insert(fields);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut body = MessageBody::default();
        event.record(&mut BodyVisitor(&mut body));

        let session = ctx.event_scope(event).and_then(|scope| {
            let layers: Vec<HashMap<String, String>> = scope
                .filter_map(|span| {
                    let extensions = span.extensions();
                    let fields = extensions.get::<SpanFields>()?.0.clone();
                    Some(fields)
                })
                .collect();
            ScopeSession::new(layers)
        });

        let mut log_event = LogEvent::new(Level::from(*metadata.level()), &body);
        log_event.origin = origin_of(metadata.target());
        log_event.file = metadata.file();
        log_event.function = metadata.module_path();
        log_event.line = metadata.line().unwrap_or(0);
        if let Some(session) = &session {
            log_event.session = Some(session as &dyn SessionContext);
        }

        self.bus.dispatch(&log_event);
    }
}

/// Events from this crate's own modules are tagged internal.
fn origin_of(target: &str) -> Origin {
    let internal = target
        .strip_prefix(CRATE_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"));
    if internal {
        Origin::Internal
    } else {
        Origin::Host
    }
}

#[derive(Debug, Default, Clone)]
struct SpanFields(HashMap<String, String>);

impl Visit for SpanFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Span fields along an event's scope, innermost span first.
struct ScopeSession {
    layers: Vec<HashMap<String, String>>,
}

impl ScopeSession {
    fn new(layers: Vec<HashMap<String, String>>) -> Option<Self> {
        let is_session = layers
            .iter()
            .any(|layer| SESSION_FIELDS.iter().any(|name| layer.contains_key(*name)));
        is_session.then_some(Self { layers })
    }
}

impl SessionContext for ScopeSession {
    fn variable(&self, name: &str) -> Option<&str> {
        self.layers
            .iter()
            .find_map(|layer| layer.get(name))
            .map(String::as_str)
    }

    fn uuid(&self) -> Option<&str> {
        self.variable("uuid")
    }
}

struct BodyVisitor<'a>(&'a mut MessageBody);

impl Visit for BodyVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_string();
        } else {
            self.0.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0.message = format!("{value:?}");
        } else {
            self.0
                .fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }
}
