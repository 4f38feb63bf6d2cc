//! Bidirectional JSON-RPC over one websocket connection.
//!
//! The read loop routes every inbound frame: responses complete the matching
//! pending request, notifications run their registered handlers on separate
//! tasks so a slow handler never stalls the loop.

use std::any::type_name;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, warn};

use super::message::{ErrorResponse, Notification, Request, RequestId, Response, RpcMessage};
use crate::{Error, Result};

/// Default time to wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

type HandlerFn = dyn Fn(Option<Value>) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Callback for one notification method, typed by its payload.
#[derive(Clone)]
pub struct NotificationHandler {
    payload: &'static str,
    invoke: Arc<HandlerFn>,
}

impl NotificationHandler {
    /// Wrap an async callback. Params are decoded into `P` before the call;
    /// params that do not decode fail the handler without calling it.
    pub fn new<P, F, Fut>(handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let invoke = move |params: Option<Value>| -> BoxFuture<'static, Result<()>> {
            match serde_json::from_value::<P>(params.unwrap_or(Value::Null)) {
                Ok(payload) => handler(payload).boxed(),
                Err(e) => {
                    let message = format!("params are not a valid {}: {e}", type_name::<P>());
                    async move { Err(Error::Handler { message }) }.boxed()
                }
            }
        };
        Self {
            payload: type_name::<P>(),
            invoke: Arc::new(invoke),
        }
    }

    /// Name of the payload type this handler expects.
    pub fn payload(&self) -> &'static str {
        self.payload
    }

    pub async fn invoke(&self, params: Option<Value>) -> Result<()> {
        (self.invoke)(params).await
    }
}

impl std::fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandler")
            .field("payload", &self.payload)
            .finish()
    }
}

struct PendingRequest {
    method: String,
    /// Distinguishes this request from a later one that draws the same id.
    seq: u64,
    created_at: Instant,
    tx: oneshot::Sender<Result<Value>>,
}

struct Inner {
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    pending: DashMap<RequestId, PendingRequest>,
    next_seq: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<NotificationHandler>>>,
    response_timeout: Duration,
}

/// Removes a pending entry however the waiting request ends.
struct PendingGuard<'a> {
    pending: &'a DashMap<RequestId, PendingRequest>,
    id: RequestId,
    seq: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .remove_if(&self.id, |_, pending| pending.seq == self.seq);
    }
}

/// JSON-RPC endpoint over one websocket connection.
///
/// Cheap to clone; clones share the connection and the pending table.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl RpcClient {
    pub fn new(response_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                outbound: Mutex::new(None),
                pending: DashMap::new(),
                next_seq: AtomicU64::new(0),
                handlers: RwLock::new(HashMap::new()),
                response_timeout,
            }),
        }
    }

    pub fn response_timeout(&self) -> Duration {
        self.inner.response_timeout
    }

    /// Register a handler for a notification method. Handlers of one method
    /// run in registration order.
    pub fn on_notification(&self, method: impl Into<String>, handler: NotificationHandler) {
        let method = method.into();
        debug!(method = %method, payload = handler.payload(), "Registered notification handler");
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method)
            .or_default()
            .push(handler);
    }

    /// Drop every registered handler.
    pub fn clear_handlers(&self) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Open the outbound queue. The returned receiver must be drained into
    /// the websocket sink by the caller's writer task.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<WsMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.outbound() = Some(tx);
        rx
    }

    pub fn is_connected(&self) -> bool {
        self.outbound().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Send a request and wait for its result with the default timeout.
    pub async fn send_request<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<Value> {
        self.send_request_with_timeout(method, params, self.inner.response_timeout)
            .await
    }

    /// Send a request and wait for its result.
    ///
    /// The pending entry is removed on every exit path, so a response that
    /// arrives after the timeout is dropped as uncorrelated.
    pub async fn send_request_with_timeout<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
        timeout: Duration,
    ) -> Result<Value> {
        let params = params.map(serde_json::to_value).transpose()?;
        let (tx, rx) = oneshot::channel();

        let (id, seq) = self.register_pending(method, tx);
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id: id.clone(),
            seq,
        };

        let frame = serde_json::to_string(&Request::new(id.clone(), method, params))?;
        debug!(id = %id, method, "Sending JSON-RPC request");
        self.send_frame(WsMessage::Text(frame))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::transport("connection dropped before response")),
            Err(_) => Err(Error::RequestTimeout {
                method: method.to_string(),
                timeout,
            }),
        }
    }

    fn register_pending(
        &self,
        method: &str,
        tx: oneshot::Sender<Result<Value>>,
    ) -> (RequestId, u64) {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        loop {
            if let Entry::Vacant(slot) = self.inner.pending.entry(RequestId::random()) {
                let id = slot.key().clone();
                slot.insert(PendingRequest {
                    method: method.to_string(),
                    seq,
                    created_at: Instant::now(),
                    tx,
                });
                return (id, seq);
            }
        }
    }

    /// Run the read loop until the stream fails or closes.
    ///
    /// Always returns an error describing why the connection ended. Before
    /// returning, every pending request is failed and the outbound queue is
    /// closed.
    pub async fn listen<S>(&self, stream: S) -> Result<()>
    where
        S: Stream<Item = std::result::Result<WsMessage, WsError>>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut handler_tasks = JoinSet::new();

        let reason = loop {
            while let Some(finished) = handler_tasks.try_join_next() {
                if let Err(e) = finished {
                    if e.is_panic() {
                        error!(error = %e, "Notification handler panicked");
                    }
                }
            }

            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => break Error::from(e),
                None => break Error::transport("websocket stream ended"),
            };

            let text = match frame {
                WsMessage::Text(text) => text,
                WsMessage::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Dropping binary frame that is not UTF-8");
                        continue;
                    }
                },
                WsMessage::Ping(payload) => {
                    // A pong we cannot queue surfaces on the next request.
                    let _ = self.send_frame(WsMessage::Pong(payload));
                    continue;
                }
                WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
                WsMessage::Close(frame) => {
                    break Error::transport(match frame {
                        Some(frame) => format!("closed by server: {} {}", frame.code, frame.reason),
                        None => "closed by server".to_string(),
                    })
                }
            };

            self.dispatch(&text, &mut handler_tasks);
        };

        handler_tasks.abort_all();
        self.disconnect(&reason);
        Err(reason)
    }

    /// Close the outbound queue and fail every pending request.
    pub fn disconnect(&self, reason: &Error) {
        self.outbound().take();

        let ids: Vec<RequestId> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        if !ids.is_empty() {
            warn!(pending = ids.len(), reason = %reason, "Failing pending requests");
        }
        for id in ids {
            if let Some((_, pending)) = self.inner.pending.remove(&id) {
                let _ = pending.tx.send(Err(Error::transport(reason.to_string())));
            }
        }
    }

    fn dispatch(&self, raw: &str, handler_tasks: &mut JoinSet<()>) {
        let message = match RpcMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, frame = raw, "Dropping invalid JSON-RPC frame");
                return;
            }
        };

        match message {
            RpcMessage::Notification(notification) => {
                self.spawn_handlers(notification, handler_tasks)
            }
            RpcMessage::Response(response) => self.resolve(response),
            RpcMessage::Error(response) => log_error_response(&response),
            RpcMessage::Request(request) => {
                warn!(
                    id = %request.id,
                    method = %request.method,
                    "Incoming JSON-RPC requests are not supported"
                );
            }
        }
    }

    fn spawn_handlers(&self, notification: Notification, handler_tasks: &mut JoinSet<()>) {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(method = %notification.method, "No handler for notification");
            return;
        }

        handler_tasks.spawn(async move {
            let Notification { method, params, .. } = notification;
            for handler in handlers {
                if let Err(e) = handler.invoke(params.clone()).await {
                    warn!(
                        method = %method,
                        payload = handler.payload(),
                        error = %e,
                        "Notification handler failed"
                    );
                }
            }
        });
    }

    fn resolve(&self, response: Response) {
        let Some(id) = response.id else {
            warn!(result = %response.result, "Dropping JSON-RPC response without id");
            return;
        };

        match self.inner.pending.remove(&id) {
            Some((_, pending)) => {
                debug!(
                    id = %id,
                    method = %pending.method,
                    elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
                    "Got JSON-RPC response"
                );
                let _ = pending.tx.send(Ok(response.result));
            }
            None => {
                let e = Error::UnknownCorrelation { id: id.to_string() };
                warn!("{e}");
            }
        }
    }

    fn send_frame(&self, frame: WsMessage) -> Result<()> {
        match self.outbound().as_ref() {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| Error::transport("outbound queue closed")),
            None => Err(Error::NotConnected),
        }
    }

    fn outbound(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<WsMessage>>> {
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .field("response_timeout", &self.inner.response_timeout)
            .finish()
    }
}

/// Error responses are not routed to the waiting request, which then runs
/// into its timeout.
fn log_error_response(response: &ErrorResponse) {
    warn!(
        id = ?response.id.as_ref().map(ToString::to_string),
        code = response.error.code,
        message = %response.error.message,
        data = ?response.error.data,
        "Got JSON-RPC error response"
    );
}
