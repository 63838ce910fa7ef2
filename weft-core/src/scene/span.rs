//! Causal context tokens.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ReactiveError;

/// Callback receiving failures that have no caller left to return them to.
pub type ErrorSink = Arc<dyn Fn(&Span, &ReactiveError) + Send + Sync>;

/// Identifier shared by every span of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u64);

impl TraceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The causal context passed through computations and notifications.
///
/// A span names the operation that caused some work and carries the sink for
/// errors that can not be returned to anyone.
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

struct SpanInner {
    trace_id: TraceId,
    op: String,
    error_sink: Option<ErrorSink>,
}

impl Span {
    /// Start a new trace for the operation `op`.
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                trace_id: TraceId::next(),
                op: op.into(),
                error_sink: None,
            }),
        }
    }

    /// A span for `op` in the same trace as `self`, sharing its error sink.
    pub fn child(&self, op: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                trace_id: self.inner.trace_id,
                op: op.into(),
                error_sink: self.inner.error_sink.clone(),
            }),
        }
    }

    /// Replace the error sink.
    pub fn with_error_sink<F>(self, sink: F) -> Self
    where
        F: Fn(&Span, &ReactiveError) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SpanInner {
                trace_id: self.inner.trace_id,
                op: self.inner.op.clone(),
                error_sink: Some(Arc::new(sink)),
            }),
        }
    }

    /// The operation name.
    pub fn op(&self) -> &str {
        &self.inner.op
    }

    /// The trace this span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.inner.trace_id
    }

    /// Report an unhandled error.
    ///
    /// Without a sink the error is logged.
    pub fn on_error(&self, err: &ReactiveError) {
        match &self.inner.error_sink {
            Some(sink) => sink(self, err),
            None => tracing::error!(op = %self.inner.op, error = %err, "unhandled error"),
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("trace_id", &self.inner.trace_id)
            .field("op", &self.inner.op)
            .field("has_error_sink", &self.inner.error_sink.is_some())
            .finish()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn child_spans_share_trace_and_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let root = Span::new("mount").with_error_sink(move |span, err| {
            seen_clone.lock().push(format!("{}: {}", span.op(), err));
        });
        let child = root.child("refresh");

        assert_eq!(root.trace_id(), child.trace_id());
        child.on_error(&ReactiveError::NoActiveTracker);

        assert_eq!(
            seen.lock().as_slice(),
            ["refresh: no active change tracker, can not read from reactive value"]
        );
    }

    #[test]
    fn new_spans_start_new_traces() {
        assert_ne!(Span::new("a").trace_id(), Span::new("b").trace_id());
    }
}
