//! Observability subsystem for revforge
//!
//! - Typed lifecycle events with stable names (`Event`)
//! - Structured output through `tracing`
//! - Scope-based begin/complete logging (`ObservationScope`)
//!
//! Observability is read-only: nothing here influences a simulation's
//! outcome, and a missing subscriber simply drops events.
//!
//! # Usage
//!
//! ```ignore
//! use revforge::observability::Event;
//! use revforge::observe;
//!
//! observe!(Event::ChainBuilt, anchor = %current, start = 3u64);
//! ```

mod events;
mod scope;

pub use events::Event;
pub use scope::ObservationScope;

#[doc(hidden)]
pub use tracing;

use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `default_filter` when set. Installing twice is a
/// no-op.
pub fn init_logging(format: LogFormat, default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Emits a lifecycle event with structured fields.
///
/// Failure events go out at WARN, everything else at INFO. Fields use the
/// usual `tracing` syntax (`key = value`, `key = %display`, `key = ?debug`).
///
/// ```ignore
/// observe!(Event::ChainBuilt, anchor = %current, start = chain.start);
/// ```
#[macro_export]
macro_rules! observe {
    ($event:expr) => {{
        let event: $crate::observability::Event = $event;
        if event.is_failure() {
            $crate::observability::tracing::warn!(event = event.as_str());
        } else {
            $crate::observability::tracing::info!(event = event.as_str());
        }
    }};
    ($event:expr, $($fields:tt)+) => {{
        let event: $crate::observability::Event = $event;
        if event.is_failure() {
            $crate::observability::tracing::warn!(event = event.as_str(), $($fields)+);
        } else {
            $crate::observability::tracing::info!(event = event.as_str(), $($fields)+);
        }
    }};
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a JSON subscriber and returns every emitted line.
    pub fn capture_json<F: FnOnce()>(f: F) -> Vec<Value> {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}
