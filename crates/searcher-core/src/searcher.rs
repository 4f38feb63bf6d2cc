//! Collaborators a searcher plugs into the auction session.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::types::{BidRequest, BidResult, Opportunity};

/// Strategy deciding whether and how to bid on a lot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bidder: Send + Sync {
    /// Build an unsigned bid for `opportunity`, or `None` to pass.
    async fn make_bid_request(
        &self,
        opportunity: &Opportunity,
    ) -> anyhow::Result<Option<BidRequest>>;
}

/// Receives the auction's verdict on every submitted bid.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn on_result(&self, result: BidResult) -> anyhow::Result<()>;
}

/// Default sink, logs each verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingResultSink;

#[async_trait]
impl ResultSink for LoggingResultSink {
    async fn on_result(&self, result: BidResult) -> anyhow::Result<()> {
        match &result.verification_result {
            Some(v) if !v.verified => warn!(
                reason = v.error_reason.as_deref().unwrap_or("unknown"),
                debug_info = ?v.error_debug_info,
                "Bid rejected"
            ),
            Some(_) => info!("Bid verified"),
            None => info!("Bid accepted without verification result"),
        }
        Ok(())
    }
}
