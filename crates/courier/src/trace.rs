//! W3C trace context for outbound requests.

use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header carrying the W3C trace context.
pub const TRACEPARENT: &str = "traceparent";

/// Extract a traceparent from the current span, if it carries a valid
/// OpenTelemetry context.
pub fn current_traceparent() -> Option<String> {
    let span = tracing::Span::current();
    let context = span.context();
    let ctx_span = context.span();
    let span_context = ctx_span.span_context();

    if span_context.is_valid() {
        Some(format_traceparent(
            span_context.trace_id(),
            span_context.span_id(),
            span_context.is_sampled(),
        ))
    } else {
        None
    }
}

fn format_traceparent(trace_id: TraceId, span_id: SpanId, sampled: bool) -> String {
    let flags = if sampled { "01" } else { "00" };
    format!("00-{}-{}-{}", trace_id, span_id, flags)
}
