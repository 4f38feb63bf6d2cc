//! Reconnect policy around auction sessions.

use std::future::Future;

use tracing::{error, info, warn};

use crate::config::ReconnectPolicy;
use crate::{Error, Result};

/// Run `attempt` up to `policy.max_attempts` times, sleeping the backoff
/// between attempts.
///
/// Every attempt outcome is logged and swallowed; the only way out is running
/// out of attempts, which yields [`Error::ReconnectsExhausted`].
pub async fn run_with_retries<F, Fut>(policy: &ReconnectPolicy, mut attempt: F) -> Result<()>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for used in 1..=policy.max_attempts {
        match attempt(used).await {
            Ok(()) => info!(attempt = used, "Auction session ended"),
            Err(e) => error!(
                attempt = used,
                fatal = e.is_fatal(),
                error = %e,
                "Auction session failed"
            ),
        }

        if used < policy.max_attempts {
            warn!(
                attempt = used,
                max_attempts = policy.max_attempts,
                "Used {} connect tries. Reconnecting in {} seconds",
                used,
                policy.backoff.as_secs_f64()
            );
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(Error::ReconnectsExhausted {
        attempts: policy.max_attempts,
    })
}
