//! Trace propagation for lots.
//!
//! The auction may attach a W3C trace carrier to each lot under
//! `__tracing_context__`. A propagator turns that carrier into the span the
//! lot is processed under.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{field, info_span, Span};

/// Carrier entries such as `traceparent` and `tracestate`.
pub type TraceContext = HashMap<String, String>;

pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";

pub trait TracePropagator: Send + Sync {
    /// Read the carrier attached to a lot, if any.
    fn extract_context(&self, carrier: Option<&Value>) -> Option<TraceContext>;

    /// Span to process a lot under, parented on the extracted context.
    fn span(&self, name: &'static str, context: Option<&TraceContext>) -> Span;
}

/// Ignores carriers and opens no span.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPropagator;

impl TracePropagator for NoopPropagator {
    fn extract_context(&self, _carrier: Option<&Value>) -> Option<TraceContext> {
        None
    }

    fn span(&self, _name: &'static str, _context: Option<&TraceContext>) -> Span {
        Span::none()
    }
}

/// Records the incoming W3C carrier on an `info` span so log lines of one lot
/// can be joined with the auction's trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPropagator;

impl TracePropagator for TracingPropagator {
    fn extract_context(&self, carrier: Option<&Value>) -> Option<TraceContext> {
        let Value::Object(entries) = carrier? else {
            return None;
        };
        let context: TraceContext = entries
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect();
        (!context.is_empty()).then_some(context)
    }

    fn span(&self, name: &'static str, context: Option<&TraceContext>) -> Span {
        let span = info_span!(
            "lot",
            operation = name,
            traceparent = field::Empty,
            tracestate = field::Empty
        );
        if let Some(context) = context {
            if let Some(parent) = context.get(TRACEPARENT) {
                span.record(TRACEPARENT, parent.as_str());
            }
            if let Some(state) = context.get(TRACESTATE) {
                span.record(TRACESTATE, state.as_str());
            }
        }
        span
    }
}
