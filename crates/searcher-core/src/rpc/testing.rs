//! In-memory connection for driving an [`RpcClient`] without a socket.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use super::{Request, RpcClient};
use crate::Result;

pub(crate) struct MockConnection {
    pub client: RpcClient,
    pub inbound: UnboundedSender<std::result::Result<WsMessage, WsError>>,
    pub outbound: UnboundedReceiver<WsMessage>,
    pub listener: JoinHandle<Result<()>>,
}

impl MockConnection {
    /// Attach a fresh client and start its read loop.
    pub fn open(response_timeout: Duration) -> Self {
        let client = RpcClient::new(response_timeout);
        let outbound = client.attach();
        let (inbound, rx) = mpsc::unbounded_channel();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let listener = {
            let client = client.clone();
            tokio::spawn(async move { client.listen(stream).await })
        };
        Self {
            client,
            inbound,
            outbound,
            listener,
        }
    }

    /// Deliver a text frame as if the server sent it.
    pub fn push(&self, frame: Value) {
        self.push_raw(WsMessage::Text(frame.to_string()));
    }

    pub fn push_raw(&self, frame: WsMessage) {
        self.inbound.send(Ok(frame)).unwrap();
    }

    /// Next request the client wrote to the socket.
    pub async fn next_request(&mut self) -> Request {
        match self.outbound.recv().await {
            Some(WsMessage::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}
