//! Structured logger used by the reconciliation pipeline

use serde_json::Value;

/// Logger seam for pipeline stages.
///
/// Each call carries a message and a JSON object of structured fields.
#[cfg_attr(test, mockall::automock)]
pub trait ReconcileLogger {
    fn debug(&self, message: &str, fields: Value);
    fn warn(&self, message: &str, fields: Value);
}

/// Forwards pipeline log lines to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ReconcileLogger for TracingLogger {
    fn debug(&self, message: &str, fields: Value) {
        tracing::debug!(fields = %fields, "{}", message);
    }

    fn warn(&self, message: &str, fields: Value) {
        tracing::warn!(fields = %fields, "{}", message);
    }
}
