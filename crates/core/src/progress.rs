//! Progress-callback contract between long-running operations and their
//! observers.

/// Receiver for fractional progress reports from a long-running operation.
///
/// `percent` is on the reporting operation's own 0–100 scale; mapping it
/// into an overall job's progress band is the implementor's business.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64, message: &str);
}

/// Sink that drops every report, for call sites where nobody is watching.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _percent: f64, _message: &str) {}
}
