//! JSON-RPC 2.0 over websocket.

pub mod client;
pub mod message;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{NotificationHandler, RpcClient, DEFAULT_RESPONSE_TIMEOUT};
pub use message::{
    ErrorObject, ErrorResponse, Notification, Request, RequestId, Response, RpcMessage,
    JSONRPC_VERSION,
};
