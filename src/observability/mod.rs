//! Observability subsystem for csvdb
//!
//! - Structured logging (JSON lines on stderr)
//! - Per-store counters
//! - Typed events
//!
//! Observability is read-only: it never changes what the store does, and a
//! failure to log never fails the caller.
//!
//! # Usage
//!
//! ```ignore
//! use csvdb::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::HeaderWritten, &[("path", "/tmp/s-t/pkg.csv")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, StoreMetrics};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
