use std::fmt::Display;
use tracing::{Level, Span, field};

/// WideEvent - one structured record per unit of work.
///
/// Attributes are recorded directly on the underlying `tracing::Span` so
/// exporters see them as span attributes rather than a single formatted
/// message. Only the fields declared in [`WideEvent::new`] can be recorded.
///
/// ```rust,ignore
/// let evt = WideEvent::new("oidc_authorization", "oidc_consent::oauth2");
/// evt.add("request_id", request.id());
/// evt.add("client_id", &client.id);
/// evt.add("outcome", outcome.kind());
/// evt.info("authorization decision");
/// ```
#[derive(Clone)]
pub struct WideEvent {
    span: Span,
}

impl WideEvent {
    /// Create a new wide event. The span name is fixed; `name` is recorded as
    /// the `event.name` attribute.
    pub fn new(name: &'static str, target: &'static str) -> Self {
        let span = tracing::span!(
            Level::INFO,
            "wide_event",
            target = target,
            event.name = %name,
            request_id = field::Empty,
            client_id = field::Empty,
            consent_mode = field::Empty,
            challenge_id = field::Empty,
            outcome = field::Empty,
            error = field::Empty,
        );
        WideEvent { span }
    }

    /// The span backing this event, for `Instrument`ing futures.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn add<V: Display>(&self, key: &'static str, value: V) {
        self.span.record(key, field::display(value));
    }

    pub fn add_opt<V: Display>(&self, key: &'static str, value: Option<V>) {
        if let Some(v) = value {
            self.add(key, v);
        }
    }

    pub fn emit(&self, message: &str, level: Level) {
        self.span.in_scope(|| match level {
            Level::ERROR => tracing::event!(Level::ERROR, message = %message),
            Level::WARN => tracing::event!(Level::WARN, message = %message),
            Level::INFO => tracing::event!(Level::INFO, message = %message),
            Level::DEBUG => tracing::event!(Level::DEBUG, message = %message),
            Level::TRACE => tracing::event!(Level::TRACE, message = %message),
        });
    }

    pub fn info(&self, message: &str) {
        self.emit(message, Level::INFO)
    }
    pub fn warn(&self, message: &str) {
        self.emit(message, Level::WARN)
    }
}
