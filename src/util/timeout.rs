//! Tool-level deadlines.

use std::future::Future;
use std::time::Duration;

use crate::tools::ToolOutcome;

/// Run a tool body under a deadline.
///
/// Expiry surfaces as [`ToolOutcome::Timeout`], not as an error.
pub async fn with_deadline(
    duration: Duration,
    future: impl Future<Output = ToolOutcome>,
) -> ToolOutcome {
    match tokio::time::timeout(duration, future).await {
        Ok(outcome) => outcome,
        Err(_) => ToolOutcome::Timeout {
            message: format!("Tool timed out after {}ms", duration.as_millis()),
        },
    }
}
