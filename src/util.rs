use std::pin::Pin;

use tokio::time::Sleep;

/// A timer that may or may not be armed.
pub type Timer = Option<Pin<Box<Sleep>>>;

/// Completes when `timer` is armed and elapses; pends forever otherwise.
///
/// The timer is left in place; disarm it by setting it to `None`. This is
/// cancel safe, so it can be used as a `tokio::select!` branch.
pub async fn elapsed(timer: &mut Timer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Arms a timer that elapses after `duration`.
#[must_use]
pub fn arm(duration: std::time::Duration) -> Timer {
    Some(Box::pin(tokio::time::sleep(duration)))
}
