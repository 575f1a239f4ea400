//! Interruptible sleeping for poll loops.

use crate::{CoreError, CoreResult};
use std::time::Duration;

/// Sleep for `duration`, or fail with [`CoreError::Interrupted`] if the
/// process receives Ctrl-C first.
///
/// Every poll loop (device authorization, MFA push) sleeps through this so
/// the user can always abort a wait.
pub async fn sleep_or_interrupt(duration: Duration) -> CoreResult<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("poll loop interrupted");
            Err(CoreError::Interrupted)
        }
    }
}
