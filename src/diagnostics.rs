//! Routing of compiler diagnostics to the user.
//!
//! The compiler's stderr and the non-result portion of its stdout are
//! forwarded line by line to a [`DiagnosticSink`]. The sink decides how the
//! text is rendered; the driver never interprets diagnostic content.

use std::sync::Mutex;

/// Receives compiler diagnostic lines.
///
/// Implementations must be callable from multiple tasks; the resident
/// session forwards stderr from a reader task while the worker forwards
/// stdout diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Forward one diagnostic line.
    fn line(&self, message: &str);

    /// Forward one line with emphasis (headers, fatal errors).
    fn emphasized(&self, message: &str) {
        self.line(message);
    }
}

/// Sink that buffers everything it receives.
///
/// Used by tests and by callers that want to capture compiler output
/// instead of printing it.
#[derive(Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl DiagnosticSink for CollectingSink {
    fn line(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}
