//! Fire-and-forget reporting sink.

use crate::error::FallbackError;

/// Receives a descriptive error on every fallback invocation.
///
/// Implementations must not block; the engine calls this while holding the
/// document lock.
pub trait ErrorReporter: Send + Sync {
    fn capture_exception(&self, error: &FallbackError);
}

/// Reporter that forwards to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture_exception(&self, error: &FallbackError) {
        tracing::error!(error = %error, "Captured fallback event");
    }
}

impl<F> ErrorReporter for F
where
    F: Fn(&FallbackError) + Send + Sync,
{
    fn capture_exception(&self, error: &FallbackError) {
        self(error)
    }
}
