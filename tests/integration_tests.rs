//! Integration tests against an in-process mock auction.
//!
//! The mock speaks the broadcaster protocol over a real websocket on
//! localhost, including its habit of omitting the `jsonrpc` member.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use searcher_sdk::core::rpc::RpcClient;
use searcher_sdk::core::signing::{user_tx_hash, BidSigner, DomainInfo};
use searcher_sdk::core::types::{BidRequest, BidResult, HexString, Opportunity};
use searcher_sdk::core::{
    AuctionClient, AuctionConfig, Bidder, Error, LoggingResultSink, ReconnectPolicy, ResultSink,
};

// Well-known development key (DO NOT USE IN PRODUCTION)
const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const CAPSULE: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const SEARCHER_CONTRACT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

struct MockAuction {
    addr: SocketAddr,
    connections: Arc<AtomicU32>,
    request_uris: Arc<Mutex<Vec<String>>>,
}

impl MockAuction {
    /// Serve every accepted connection with `behavior`.
    async fn start<F, Fut>(behavior: F) -> Self
    where
        F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let request_uris = Arc::new(Mutex::new(Vec::new()));

        let behavior = Arc::new(behavior);
        let counter = connections.clone();
        let uris = request_uris.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let uris = uris.clone();
                let record_uri = move |request: &Request,
                                       response: Response|
                      -> Result<Response, ErrorResponse> {
                    uris.lock().unwrap().push(request.uri().to_string());
                    Ok(response)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, record_uri).await else {
                    continue;
                };
                tokio::spawn((*behavior)(ws));
            }
        });

        Self {
            addr,
            connections,
            request_uris,
        }
    }

    fn config(&self) -> AuctionConfig {
        let mut config = AuctionConfig::new(format!("ws://{}", self.addr), "test-token");
        config.ping_interval = Duration::from_millis(20);
        config.ping_timeout = Duration::from_millis(200);
        config.response_timeout = Duration::from_secs(2);
        config
    }
}

fn test_signer() -> BidSigner {
    BidSigner::from_private_key(TEST_PRIVATE_KEY, DomainInfo::capsule(56, CAPSULE.parse().unwrap()))
        .unwrap()
}

fn lot_params() -> Value {
    json!({
        "lotId": "lot-1",
        "txn": {
            "from": "0x1111111111111111111111111111111111111111",
            "to": "0xf8e81D47203A594245E36C48e151709F0C19fBe8",
            "value": "0x0",
            "input": "0x4242"
        },
        "logs": [],
        "minDeadline": 1700000000
    })
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next JSON-RPC frame from the client, skipping control frames.
async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = message {
            return Some(serde_json::from_str(&text).unwrap());
        }
    }
    None
}

struct FixedBidder;

#[async_trait]
impl Bidder for FixedBidder {
    async fn make_bid_request(
        &self,
        opportunity: &Opportunity,
    ) -> anyhow::Result<Option<BidRequest>> {
        Ok(Some(BidRequest {
            to: HexString::new(SEARCHER_CONTRACT)?,
            gas: 1_000_000,
            nonce: U256::from(1u64),
            data: HexString::new("0x")?,
            bid: U256::from(10_000_000_000u64),
            user_call_hash: user_tx_hash(opportunity)?,
            max_gas_price: U256::from(5_000_000_000u64),
            deadline: opportunity.min_deadline.unwrap_or_default() + 30,
        }))
    }
}

struct PassingBidder;

#[async_trait]
impl Bidder for PassingBidder {
    async fn make_bid_request(&self, _: &Opportunity) -> anyhow::Result<Option<BidRequest>> {
        Ok(None)
    }
}

struct ChannelSink(mpsc::UnboundedSender<BidResult>);

#[async_trait]
impl ResultSink for ChannelSink {
    async fn on_result(&self, result: BidResult) -> anyhow::Result<()> {
        self.0.send(result)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_bid_round_trip_through_mock_auction() {
    let (bids_tx, mut bids_rx) = mpsc::unbounded_channel::<Value>();
    let server = MockAuction::start(move |mut ws| {
        let bids_tx = bids_tx.clone();
        async move {
            send_json(&mut ws, json!({"method": "user_transaction", "params": lot_params()})).await;
            while let Some(frame) = next_json(&mut ws).await {
                match frame["method"].as_str() {
                    Some("ping") => {
                        send_json(&mut ws, json!({"id": frame["id"], "result": "pong"})).await
                    }
                    Some("make_bid") => {
                        bids_tx.send(frame["params"].clone()).unwrap();
                        send_json(
                            &mut ws,
                            json!({
                                "id": frame["id"],
                                "result": {"verificationResult": {"verified": true}}
                            }),
                        )
                        .await;
                    }
                    _ => {}
                }
            }
        }
    })
    .await;

    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let client = AuctionClient::new(server.config(), test_signer());
    let session = tokio::spawn(async move {
        client
            .connect_and_listen(Arc::new(FixedBidder), Arc::new(ChannelSink(results_tx)))
            .await
    });

    let params = tokio::time::timeout(Duration::from_secs(5), bids_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(params["lotId"], "lot-1");

    let request = &params["searcherRequest"];
    assert_eq!(
        request["userCallHash"],
        "0x15168fc51e3196519c6c3174da94796fe0f75403aa1011a6b0eef67fb4212087"
    );
    assert_eq!(request["nonce"], "0x1");
    assert_eq!(request["bid"], "0x2540be400");
    assert_eq!(request["maxGasPrice"], "0x12a05f200");
    assert_eq!(request["gas"], 1_000_000);
    assert_eq!(request["deadline"], 1_700_000_030u64);

    // The signature on the wire is the canonical one for the request sent.
    let sent: BidRequest = serde_json::from_value(request.clone()).unwrap();
    let signature = params["searcherSignature"].as_str().unwrap();
    assert_eq!(signature, test_signer().sign_request(&sent).unwrap().as_str());
    assert_eq!(signature.len(), 132);

    let result = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.verified(), Some(true));

    assert_eq!(
        server.request_uris.lock().unwrap().as_slice(),
        ["/broadcaster/listen?token=test-token"]
    );
    session.abort();
}

#[tokio::test]
async fn test_missing_pong_terminates_session() {
    let pings = Arc::new(AtomicU32::new(0));
    let counter = pings.clone();
    let server = MockAuction::start(move |mut ws| {
        let counter = counter.clone();
        async move {
            while let Some(frame) = next_json(&mut ws).await {
                if frame["method"] == "ping" && counter.fetch_add(1, Ordering::SeqCst) < 5 {
                    send_json(&mut ws, json!({"id": frame["id"], "result": "pong"})).await;
                }
            }
        }
    })
    .await;

    let client = AuctionClient::new(server.config(), test_signer());
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.connect_and_listen(Arc::new(PassingBidder), Arc::new(LoggingResultSink)),
    )
    .await
    .unwrap();

    match result {
        Err(Error::Liveness { message }) => assert!(message.contains("did not receive pong")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pings.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_server_close_fails_pending_requests() {
    let server = MockAuction::start(|mut ws| async move {
        // Swallow three requests, then hang up without answering.
        for _ in 0..3 {
            if next_json(&mut ws).await.is_none() {
                return;
            }
        }
        let _ = ws.close(None).await;
    })
    .await;

    let url = server.config().listen_url().unwrap();
    let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut sink, stream) = socket.split();

    let rpc = RpcClient::new(Duration::from_secs(30));
    let mut outbound = rpc.attach();
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });
    let listener = {
        let rpc = rpc.clone();
        tokio::spawn(async move { rpc.listen(stream).await })
    };

    let calls: Vec<_> = (0..3)
        .map(|i| {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.send_request("make_bid", Some(json!({ "n": i }))).await })
        })
        .collect();

    for call in calls {
        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Transport { .. })));
    }
    assert_eq!(rpc.pending_count(), 0);
    assert!(listener.await.unwrap().is_err());
}

#[tokio::test]
async fn test_reconnects_stop_at_max_attempts() {
    let server = MockAuction::start(|ws| async move {
        drop(ws);
    })
    .await;

    let client = AuctionClient::new(server.config(), test_signer());
    let policy = ReconnectPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(10),
    };
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        client.run_forever(Arc::new(PassingBidder), Arc::new(LoggingResultSink), policy),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::ReconnectsExhausted { attempts: 3 })));
    assert_eq!(server.connections.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_mismatched_bid_is_never_submitted() {
    struct WrongHashBidder;

    #[async_trait]
    impl Bidder for WrongHashBidder {
        async fn make_bid_request(
            &self,
            opportunity: &Opportunity,
        ) -> anyhow::Result<Option<BidRequest>> {
            let mut request = FixedBidder.make_bid_request(opportunity).await?;
            if let Some(request) = request.as_mut() {
                request.user_call_hash = HexString::from_bytes(&[0u8; 32]);
            }
            Ok(request)
        }
    }

    let (methods_tx, mut methods_rx) = mpsc::unbounded_channel::<String>();
    let server = MockAuction::start(move |mut ws| {
        let methods_tx = methods_tx.clone();
        async move {
            send_json(&mut ws, json!({"method": "user_transaction", "params": lot_params()})).await;
            while let Some(frame) = next_json(&mut ws).await {
                let method = frame["method"].as_str().unwrap_or_default().to_string();
                if method == "ping" {
                    send_json(&mut ws, json!({"id": frame["id"], "result": "pong"})).await;
                }
                let _ = methods_tx.send(method);
            }
        }
    })
    .await;

    let client = AuctionClient::new(server.config(), test_signer());
    let session = tokio::spawn(async move {
        client
            .connect_and_listen(Arc::new(WrongHashBidder), Arc::new(LoggingResultSink))
            .await
    });

    // The session stays up and only ever pings.
    for _ in 0..5 {
        let method = tokio::time::timeout(Duration::from_secs(5), methods_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(method, "ping");
    }
    assert!(!session.is_finished());
    session.abort();
}
