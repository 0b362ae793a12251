//! Common helpers shared by the Google Cloud REST clients: resource paths and
//! per-operation span bookkeeping.

use crate::error::ProviderError;
use std::time::{Duration, Instant};
use tracing::{field, Span};

/// `projects/{project}`
pub fn format_project_path(project_id: &str) -> String {
    format!("projects/{project_id}")
}

/// `projects/{project}/secrets/{secret}`
pub fn format_secret_path(project_id: &str, secret_name: &str) -> String {
    format!("projects/{project_id}/secrets/{secret_name}")
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Records outcome and duration of one provider call on its span
///
/// The span must declare `operation.success`, `operation.duration_ms` and
/// `error.message` (as `field::Empty`) for the records to show up.
#[derive(Debug)]
pub struct OperationTracker {
    start: Instant,
    span: Span,
}

impl OperationTracker {
    pub fn new(span: Span) -> Self {
        Self {
            start: Instant::now(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record the result and hand it back unchanged
    pub fn finish<T>(self, result: Result<T, ProviderError>) -> Result<T, ProviderError> {
        self.span
            .record("operation.duration_ms", duration_ms(self.start.elapsed()));
        match &result {
            Ok(_) => {
                self.span.record("operation.success", true);
            }
            Err(e) => {
                self.span.record("operation.success", false);
                self.span.record("error.message", field::display(e));
            }
        }
        result
    }
}
