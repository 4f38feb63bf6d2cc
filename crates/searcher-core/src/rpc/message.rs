//! JSON-RPC 2.0 envelopes.
//!
//! Frames are classified by which members they carry, not by trial
//! deserialisation, so a frame with a malformed payload is still routed to the
//! right place and only fails when its payload is decoded for a handler.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Correlation identifier of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Str(String),
    Num(serde_json::Number),
}

impl RequestId {
    /// A random 8-hex-char id. Ids are random rather than sequential so they
    /// do not collide across sessions.
    pub fn random() -> Self {
        RequestId::Str(hex::encode(rand::random::<[u8; 4]>()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Str(s) => f.write_str(s),
            RequestId::Num(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    /// Always serialised, as `null` when absent.
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub error: ErrorObject,
}

/// Any frame the auction can send.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Notification(Notification),
    Request(Request),
    Response(Response),
    Error(ErrorResponse),
}

impl RpcMessage {
    /// Decode one frame.
    ///
    /// `method` without `id` is a notification, `method` with `id` a request,
    /// then `result` marks a response and `error` an error response.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(|e| Error::Decode {
            message: format!("invalid JSON: {e}"),
        })?;
        let Value::Object(fields) = &value else {
            return Err(Error::Decode {
                message: "frame is not a JSON object".to_string(),
            });
        };

        let has_id = fields.get("id").is_some_and(|id| !id.is_null());
        let message = if fields.contains_key("method") {
            if has_id {
                serde_json::from_value(value).map(RpcMessage::Request)
            } else {
                serde_json::from_value(value).map(RpcMessage::Notification)
            }
        } else if fields.contains_key("result") {
            serde_json::from_value(value).map(RpcMessage::Response)
        } else if fields.contains_key("error") {
            serde_json::from_value(value).map(RpcMessage::Error)
        } else {
            return Err(Error::Decode {
                message: "frame is neither a request, notification nor response".to_string(),
            });
        };

        message.map_err(|e| Error::Decode {
            message: e.to_string(),
        })
    }
}
