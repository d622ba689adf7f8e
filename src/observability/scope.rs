//! ObservationScope for start/complete logging around a unit of work
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` if dropped without being closed
//!
//! Scope fields live on a `tracing::Span`, so every event emitted inside
//! the span carries them as structured data.

use std::time::Instant;

use tracing::Span;

/// A scope that logs its own begin and end.
///
/// ```ignore
/// let span = tracing::info_span!("simulation", scenario = %id);
/// let scope = ObservationScope::in_span("SIMULATION", span);
/// // ... do work, instrumented with scope.span() ...
/// scope.complete(); // SIMULATION_COMPLETE with elapsed_ms
/// ```
pub struct ObservationScope {
    name: &'static str,
    span: Span,
    started: Instant,
    closed: bool,
}

impl ObservationScope {
    pub fn new(name: &'static str) -> Self {
        Self::in_span(name, Span::current())
    }

    pub fn in_span(name: &'static str, span: Span) -> Self {
        span.in_scope(|| tracing::info!(event = %format!("{}_BEGIN", name)));
        Self {
            name,
            span,
            started: Instant::now(),
            closed: false,
        }
    }

    /// Span carrying this scope's fields.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Elapsed time since the scope opened, in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn complete(mut self) {
        self.closed = true;
        let elapsed_ms = self.elapsed_ms() as u64;
        self.span.in_scope(|| {
            tracing::info!(event = %format!("{}_COMPLETE", self.name), elapsed_ms)
        });
    }

    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let elapsed_ms = self.elapsed_ms() as u64;
        self.span.in_scope(|| {
            tracing::warn!(event = %format!("{}_FAILED", self.name), elapsed_ms, reason)
        });
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            self.span.in_scope(|| {
                tracing::warn!(
                    event = %format!("{}_INCOMPLETE", self.name),
                    reason = "scope dropped without completion"
                )
            });
        }
    }
}
