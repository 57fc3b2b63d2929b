//! Deadline-driven cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Create a token that cancels itself once `timeout` has elapsed.
///
/// The timer runs on the current tokio runtime and stops early if the token
/// is cancelled by someone else. Must be called from within a runtime.
pub fn cancel_after(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => timer.cancel(),
            _ = timer.cancelled() => {}
        }
    });
    token
}
