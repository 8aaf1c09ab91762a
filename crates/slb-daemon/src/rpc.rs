//! Newline-delimited JSON-RPC 2.0 wire types.
//!
//! One JSON object per line in both directions. Requests carry an `id`;
//! the server's `event` notifications (after `subscribe`) carry none.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON parse failure.
pub const PARSE_ERROR: i64 = -32700;
/// Unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Parameters did not match the method.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal server failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// A subscriber fell behind and was dropped.
pub const SLOW_CONSUMER: i64 = -32001;
/// The daemon's connection cap was hit.
pub const CONNECTION_LIMIT: i64 = -32002;
/// An entity was not found.
pub const NOT_FOUND: i64 = -32004;
/// The caller is not authorized for the operation.
pub const UNAUTHORIZED: i64 = -32005;
/// The operation conflicts with current state.
pub const CONFLICT: i64 = -32006;
/// A window lapsed before the operation.
pub const EXPIRED: i64 = -32007;
/// Refused by policy.
pub const POLICY_BLOCKED: i64 = -32008;

/// An incoming request (or notification, when `id` is absent).
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Protocol version; expected `"2.0"`.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request id echoed in the response; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

/// An error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Extra detail, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An outgoing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The request id this answers (`null` for parse errors).
    pub id: Value,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// A success response.
    #[must_use]
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response.
    #[must_use]
    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A server-initiated notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Notification method; events use `"event"`.
    pub method: String,
    /// The payload.
    pub params: Value,
}

impl RpcNotification {
    /// An `event` notification.
    #[must_use]
    pub fn event(params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "event".to_string(),
            params,
        }
    }
}
