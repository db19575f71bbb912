// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Envelope types and codec
//!
//! JSON-RPC 2.0 request, notification and response envelopes, plus the
//! decoder that turns raw bytes into validated envelopes. Decoding never
//! panics and every failure carries enough information to build an error
//! response (with `id: null` when the id cannot be recovered).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::codes;

/// JSON-RPC 2.0 protocol version
pub const JSONRPC_VERSION: &str = "2.0";

// =============================================================================
// Core JSON-RPC 2.0 Types
// =============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: JsonRpcId,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: JsonRpcId,
}

/// JSON-RPC 2.0 Notification (no id, no response expected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 ID (can be string, number, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
    Null,
}

impl fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonRpcId::String(s) => write!(f, "{s}"),
            JsonRpcId::Number(n) => write!(f, "{n}"),
            JsonRpcId::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for JsonRpcId {
    fn from(value: i64) -> Self {
        JsonRpcId::Number(value)
    }
}

impl From<&str> for JsonRpcId {
    fn from(value: &str) -> Self {
        JsonRpcId::String(value.to_string())
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create an error with an arbitrary code
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data to the error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }

    /// Invalid request (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    /// Method not found (-32601); the method name travels in `data`
    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {}", method))
            .with_data(json!({ "method": method }))
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }
}

impl JsonRpcRequest {
    /// Create a request with the given id
    pub fn new(id: impl Into<JsonRpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

impl JsonRpcNotification {
    /// Create a notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse into the call outcome. A response without `error` is a
    /// success even when `result` was serialized as `null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// =============================================================================
// Codec
// =============================================================================

/// A validated inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl Incoming {
    pub fn method(&self) -> &str {
        match self {
            Incoming::Request(r) => &r.method,
            Incoming::Notification(n) => &n.method,
        }
    }
}

/// Decoding failure together with whatever id could be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub id: JsonRpcId,
    pub error: JsonRpcError,
}

impl DecodeError {
    fn new(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self { id, error }
    }

    /// The error response owed to the peer.
    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::error(self.id, self.error)
    }
}

/// Result of decoding one frame: a single envelope or a JSON-RPC batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Single(Result<Incoming, DecodeError>),
    Batch(Vec<Result<Incoming, DecodeError>>),
}

/// Decode raw bytes into envelopes.
pub fn decode(bytes: &[u8]) -> Decoded {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            return Decoded::Single(Err(DecodeError::new(
                JsonRpcId::Null,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            )))
        }
    };

    match value {
        Value::Array(items) if items.is_empty() => Decoded::Single(Err(DecodeError::new(
            JsonRpcId::Null,
            JsonRpcError::invalid_request("Empty batch"),
        ))),
        Value::Array(items) => Decoded::Batch(items.into_iter().map(decode_value).collect()),
        other => Decoded::Single(decode_value(other)),
    }
}

/// Validate one already-parsed JSON value as a request or notification.
pub fn decode_value(value: Value) -> Result<Incoming, DecodeError> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => {
            return Err(DecodeError::new(
                JsonRpcId::Null,
                JsonRpcError::invalid_request("Envelope must be a JSON object"),
            ))
        }
    };

    // Absent id means notification; an explicit null is a request.
    let id = match obj.remove("id") {
        None => None,
        Some(raw) => match serde_json::from_value::<JsonRpcId>(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                return Err(DecodeError::new(
                    JsonRpcId::Null,
                    JsonRpcError::invalid_request("id must be a string, an integer or null"),
                ))
            }
        },
    };
    let reply_id = id.clone().unwrap_or(JsonRpcId::Null);

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        Some(other) => {
            return Err(DecodeError::new(
                reply_id,
                JsonRpcError::invalid_request(format!("Unsupported jsonrpc version: {}", other)),
            ))
        }
        None => {
            return Err(DecodeError::new(
                reply_id,
                JsonRpcError::invalid_request("Missing jsonrpc version"),
            ))
        }
    }

    let method = match obj.remove("method") {
        Some(Value::String(m)) if !m.is_empty() => m,
        Some(_) => {
            return Err(DecodeError::new(
                reply_id,
                JsonRpcError::invalid_request("method must be a non-empty string"),
            ))
        }
        None => {
            return Err(DecodeError::new(
                reply_id,
                JsonRpcError::invalid_request("Missing method"),
            ))
        }
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => None,
        Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p),
        Some(_) => {
            return Err(DecodeError::new(
                reply_id,
                JsonRpcError::invalid_request("params must be an object or an array"),
            ))
        }
    };

    Ok(match id {
        Some(id) => Incoming::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
            id,
        }),
        None => Incoming::Notification(JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
        }),
    })
}

/// Encode any envelope as a JSON string.
///
/// Envelopes only hold JSON values, so serialization cannot realistically
/// fail; if it ever does the peer still receives a well-formed internal error.
pub fn encode<T: Serialize>(envelope: &T) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|e| {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "error": { "code": codes::INTERNAL_ERROR, "message": format!("Failed to encode response: {}", e) },
            "id": Value::Null,
        })
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(decoded: Decoded) -> Result<Incoming, DecodeError> {
        match decoded {
            Decoded::Single(r) => r,
            Decoded::Batch(_) => panic!("expected a single envelope"),
        }
    }

    #[test]
    fn test_decode_request_and_notification() {
        let req = single(decode(br#"{"jsonrpc":"2.0","method":"system.ping","id":7}"#)).unwrap();
        assert_eq!(
            req,
            Incoming::Request(JsonRpcRequest::new(7, "system.ping", None))
        );

        let note = single(decode(br#"{"jsonrpc":"2.0","method":"chat.interrupt"}"#)).unwrap();
        assert!(matches!(note, Incoming::Notification(n) if n.method == "chat.interrupt"));
    }

    #[test]
    fn test_explicit_null_id_is_a_request() {
        let req = single(decode(br#"{"jsonrpc":"2.0","method":"system.ping","id":null}"#)).unwrap();
        assert!(matches!(req, Incoming::Request(r) if r.id == JsonRpcId::Null));
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let err = single(decode(b"{not json")).unwrap_err();
        assert_eq!(err.id, JsonRpcId::Null);
        assert_eq!(err.error.code, codes::PARSE_ERROR);
    }

    #[test]
    fn test_invalid_request_recovers_id() {
        let err = single(decode(br#"{"jsonrpc":"2.0","id":"abc"}"#)).unwrap_err();
        assert_eq!(err.id, JsonRpcId::String("abc".into()));
        assert_eq!(err.error.code, codes::INVALID_REQUEST);

        let err = single(decode(br#"{"jsonrpc":"1.0","method":"x","id":3}"#)).unwrap_err();
        assert_eq!(err.id, JsonRpcId::Number(3));
        assert_eq!(err.error.code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_scalar_params_rejected() {
        let err = single(decode(br#"{"jsonrpc":"2.0","method":"x","params":5,"id":1}"#)).unwrap_err();
        assert_eq!(err.error.code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_batch_decoding() {
        match decode(br#"[{"jsonrpc":"2.0","method":"a","id":1}, 42]"#) {
            Decoded::Batch(items) => {
                assert_eq!(items.len(), 2);
                assert!(items[0].is_ok());
                assert!(items[1].is_err());
            }
            Decoded::Single(_) => panic!("expected batch"),
        }

        let err = single(decode(b"[]")).unwrap_err();
        assert_eq!(err.error.code, codes::INVALID_REQUEST);
    }

    #[test]
    fn test_response_encoding_has_exactly_one_outcome() {
        let ok = JsonRpcResponse::success(JsonRpcId::Number(1), Value::Null);
        let text = encode(&ok);
        assert!(text.contains("\"result\":null"));
        assert!(!text.contains("\"error\""));

        let err = JsonRpcResponse::error(
            JsonRpcId::String("x".into()),
            JsonRpcError::method_not_found("system.pong"),
        );
        let text = encode(&err);
        assert!(!text.contains("\"result\""));
        assert!(text.contains("-32601"));
        assert!(text.contains("system.pong"));
    }

    #[test]
    fn test_into_result_treats_null_result_as_success() {
        let decoded: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":null,"id":1}"#).unwrap();
        assert_eq!(decoded.into_result().unwrap(), Value::Null);
    }
}
