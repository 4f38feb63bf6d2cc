//! Auction session: one websocket connection to the Wallchain broadcaster.
//!
//! A session connects, answers every `user_transaction` lot with a signed
//! bid, and probes the connection with `ping` until something breaks. It
//! never reconnects by itself; see [`crate::api::retry`] for that.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{AuctionConfig, ReconnectPolicy};
use crate::rpc::{NotificationHandler, RpcClient};
use crate::searcher::{Bidder, ResultSink};
use crate::signing::{user_tx_hash, BidSigner};
use crate::trace_context::{NoopPropagator, TracePropagator};
use crate::types::{BidResult, MakeBidParams, Opportunity, SignedBid};
use crate::{Error, Result};

use super::retry::run_with_retries;

/// Notification carrying a new lot.
pub const USER_TRANSACTION: &str = "user_transaction";
/// Request submitting a signed bid.
pub const MAKE_BID: &str = "make_bid";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

/// How long background tasks get to stop once a session ends.
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Submits signed bids over a live session.
#[derive(Debug, Clone)]
pub struct BidSubmitter {
    rpc: RpcClient,
}

impl BidSubmitter {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Send `make_bid` for a lot and wait for the auction's verdict.
    pub async fn make_bid(&self, lot_id: &str, bid: &SignedBid) -> Result<BidResult> {
        let params = MakeBidParams::new(lot_id, bid.clone());
        match self.rpc.send_request(MAKE_BID, Some(params)).await? {
            Value::Null => Ok(BidResult::default()),
            result => Ok(serde_json::from_value(result)?),
        }
    }
}

/// Turns lots into submitted bids.
struct LotProcessor {
    signer: BidSigner,
    submitter: BidSubmitter,
    bidder: Arc<dyn Bidder>,
    results: Arc<dyn ResultSink>,
    propagator: Arc<dyn TracePropagator>,
}

impl LotProcessor {
    async fn process(&self, lot: Opportunity) -> Result<()> {
        let context = self.propagator.extract_context(lot.trace_context.as_ref());
        let span = self.propagator.span("process_lot", context.as_ref());
        self.bid_on(lot).instrument(span).await
    }

    async fn bid_on(&self, lot: Opportunity) -> Result<()> {
        info!(lot_id = %lot.lot_id, to = %lot.txn.to, "Got lot");

        let request = self
            .bidder
            .make_bid_request(&lot)
            .await
            .map_err(|e| Error::Handler {
                message: format!("bidder failed on lot {}: {e:#}", lot.lot_id),
            })?;
        let Some(request) = request else {
            debug!(lot_id = %lot.lot_id, "Bidder passed on lot");
            return Ok(());
        };

        let expected = user_tx_hash(&lot)?;
        if request.user_call_hash.as_bytes() != expected.as_bytes() {
            return Err(Error::UserCallHashMismatch {
                expected: expected.to_string(),
                actual: request.user_call_hash.to_string(),
            });
        }

        let bid = self.signer.sign(request)?;
        let result = self.submitter.make_bid(&lot.lot_id, &bid).await?;
        info!(lot_id = %lot.lot_id, verified = ?result.verified(), "Got make bid result");

        self.results.on_result(result).await.map_err(|e| Error::Handler {
            message: format!("result sink failed on lot {}: {e:#}", lot.lot_id),
        })
    }
}

/// Probe the connection with `ping` until it stops answering.
///
/// Returns the liveness failure that ended the probe. A reply other than
/// `"pong"` is logged and tolerated.
pub async fn keep_alive(rpc: RpcClient, interval: Duration, timeout: Duration) -> Error {
    loop {
        debug!("Sending ping");
        match rpc.send_request_with_timeout::<()>(PING, None, timeout).await {
            Ok(Value::String(reply)) if reply == PONG => debug!("Got pong"),
            Ok(reply) => warn!(reply = %reply, "Wrong response to ping"),
            Err(Error::RequestTimeout { .. }) => {
                return Error::Liveness {
                    message: format!("did not receive pong in {}s", timeout.as_secs_f64()),
                }
            }
            Err(e) => {
                return Error::Liveness {
                    message: format!("failed to send ping: {e}"),
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}

/// Drain the outbound queue into the socket.
async fn write_frames<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
) -> Result<()>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        sink.send(frame).await?;
    }
    // Queue closed by teardown; a failed close changes nothing.
    let _ = sink.close().await;
    Ok(())
}

/// Aborts the task when dropped.
struct TaskGuard<T>(JoinHandle<T>);

impl<T> TaskGuard<T> {
    async fn shutdown(&mut self, name: &str, grace: Duration) {
        if self.0.is_finished() {
            return;
        }
        self.0.abort();
        if tokio::time::timeout(grace, &mut self.0).await.is_err() {
            warn!(task = name, grace_secs = grace.as_secs(), "Task did not stop in time");
        }
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Releases everything a session registered on its client, including when
/// the session future is dropped mid-flight.
struct SessionGuard {
    rpc: RpcClient,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.rpc.clear_handlers();
        self.rpc.disconnect(&Error::transport("session closed"));
    }
}

/// Client for the Wallchain auction.
pub struct AuctionClient {
    config: AuctionConfig,
    signer: BidSigner,
    propagator: Arc<dyn TracePropagator>,
}

impl AuctionClient {
    pub fn new(config: AuctionConfig, signer: BidSigner) -> Self {
        Self {
            config,
            signer,
            propagator: Arc::new(NoopPropagator),
        }
    }

    /// Process lots under spans from `propagator`.
    pub fn with_propagator(mut self, propagator: Arc<dyn TracePropagator>) -> Self {
        self.propagator = propagator;
        self
    }

    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// Run one session to completion.
    ///
    /// Returns only when the session failed: the connection broke, closed,
    /// or stopped answering pings.
    pub async fn connect_and_listen(
        &self,
        bidder: Arc<dyn Bidder>,
        results: Arc<dyn ResultSink>,
    ) -> Result<()> {
        let url = self.config.listen_url()?;
        info!(url = %self.config.url, "Connecting to auction");
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        info!("Connected, listening for lots");
        self.run_session(ws_stream, bidder, results).await
    }

    /// Run sessions back to back under `policy` until attempts run out.
    pub async fn run_forever(
        &self,
        bidder: Arc<dyn Bidder>,
        results: Arc<dyn ResultSink>,
        policy: ReconnectPolicy,
    ) -> Result<()> {
        info!(
            max_attempts = policy.max_attempts,
            backoff_secs = policy.backoff.as_secs(),
            "Starting listening for lots indefinitely"
        );
        run_with_retries(&policy, |_| {
            let bidder = bidder.clone();
            let results = results.clone();
            async move { self.connect_and_listen(bidder, results).await }
        })
        .await
    }

    async fn run_session<S>(
        &self,
        socket: S,
        bidder: Arc<dyn Bidder>,
        results: Arc<dyn ResultSink>,
    ) -> Result<()>
    where
        S: Stream<Item = std::result::Result<WsMessage, WsError>>
            + Sink<WsMessage, Error = WsError>
            + Send
            + 'static,
    {
        let rpc = RpcClient::new(self.config.response_timeout);
        let _session = SessionGuard { rpc: rpc.clone() };

        let processor = Arc::new(LotProcessor {
            signer: self.signer.clone(),
            submitter: BidSubmitter::new(rpc.clone()),
            bidder,
            results,
            propagator: self.propagator.clone(),
        });
        rpc.on_notification(
            USER_TRANSACTION,
            NotificationHandler::new(move |lot: Opportunity| {
                let processor = processor.clone();
                async move { processor.process(lot).await }
            }),
        );

        let (sink, stream) = socket.split();
        let mut writer = TaskGuard(tokio::spawn(write_frames(sink, rpc.attach())));
        let mut liveness = TaskGuard(tokio::spawn(keep_alive(
            rpc.clone(),
            self.config.ping_interval,
            self.config.ping_timeout,
        )));

        let reason = tokio::select! {
            res = rpc.listen(stream) => res
                .err()
                .unwrap_or_else(|| Error::transport("read loop stopped")),
            res = &mut writer.0 => match res {
                Ok(Ok(())) => Error::transport("outbound queue closed"),
                Ok(Err(e)) => e,
                Err(e) => Error::transport(format!("writer task failed: {e}")),
            },
            res = &mut liveness.0 => res
                .unwrap_or_else(|e| Error::transport(format!("liveness task failed: {e}"))),
        };

        rpc.disconnect(&reason);
        liveness.shutdown("liveness", TASK_SHUTDOWN_GRACE).await;
        writer.shutdown("writer", TASK_SHUTDOWN_GRACE).await;

        error!(error = %reason, "Auction session terminated");
        Err(reason)
    }
}

impl std::fmt::Debug for AuctionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionClient")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .finish()
    }
}
