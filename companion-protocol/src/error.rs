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

//! Error taxonomy shared by the router and its callers.

use companion_hooks::RegistryError;
use serde_json::json;
use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Wire error codes.
pub mod codes {
    // Reserved protocol range
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Application range
    pub const HOOK_REGISTRATION_FAILED: i32 = -32000;
    pub const HOOK_NOT_FOUND: i32 = -32001;
    pub const ACTION_FAILED: i32 = -32002;
    pub const STATE_UNAVAILABLE: i32 = -32003;
    pub const CONFIG_ERROR: i32 = -32004;
    pub const CHAT_ERROR: i32 = -32005;
    pub const VIEWER_ERROR: i32 = -32006;
    pub const SCENARIO_ERROR: i32 = -32007;
}

/// Failure of a routed call. Every variant has one fixed wire code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Hook registration failed: {0}")]
    HookRegistrationFailed(String),

    #[error("Hook not found: {0}")]
    HookNotFound(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("State unavailable: {0}")]
    StateUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Viewer error: {0}")]
    Viewer(String),

    #[error("Scenario error: {0}")]
    Scenario(String),
}

impl RpcError {
    pub fn invalid_params(method: impl Into<String>, reason: impl Into<String>) -> Self {
        RpcError::InvalidParams {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse(_) => codes::PARSE_ERROR,
            RpcError::InvalidRequest(_) => codes::INVALID_REQUEST,
            RpcError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            RpcError::InvalidParams { .. } => codes::INVALID_PARAMS,
            RpcError::Internal(_) => codes::INTERNAL_ERROR,
            RpcError::HookRegistrationFailed(_) => codes::HOOK_REGISTRATION_FAILED,
            RpcError::HookNotFound(_) => codes::HOOK_NOT_FOUND,
            RpcError::ActionFailed(_) => codes::ACTION_FAILED,
            RpcError::StateUnavailable(_) => codes::STATE_UNAVAILABLE,
            RpcError::Config(_) => codes::CONFIG_ERROR,
            RpcError::Chat(_) => codes::CHAT_ERROR,
            RpcError::Viewer(_) => codes::VIEWER_ERROR,
            RpcError::Scenario(_) => codes::SCENARIO_ERROR,
        }
    }

    /// Wire form of this error.
    pub fn to_json_rpc(&self) -> JsonRpcError {
        match self {
            RpcError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            RpcError::InvalidParams { method, reason } => {
                JsonRpcError::new(self.code(), format!("Invalid params for {}", method))
                    .with_data(json!({ "method": method, "reason": reason }))
            }
            RpcError::HookNotFound(id) => JsonRpcError::new(self.code(), self.to_string())
                .with_data(json!({ "hookId": id })),
            other => JsonRpcError::new(other.code(), other.to_string()),
        }
    }
}

impl From<RpcError> for JsonRpcError {
    fn from(err: RpcError) -> Self {
        err.to_json_rpc()
    }
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::HookNotFound(id) => RpcError::HookNotFound(id),
            other => RpcError::HookRegistrationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_codes_descend_from_32000() {
        let ordered = [
            RpcError::HookRegistrationFailed(String::new()),
            RpcError::HookNotFound(String::new()),
            RpcError::ActionFailed(String::new()),
            RpcError::StateUnavailable(String::new()),
            RpcError::Config(String::new()),
            RpcError::Chat(String::new()),
            RpcError::Viewer(String::new()),
            RpcError::Scenario(String::new()),
        ];
        for (i, err) in ordered.iter().enumerate() {
            assert_eq!(err.code(), -32000 - i as i32);
        }
    }

    #[test]
    fn test_method_not_found_carries_name() {
        let wire = RpcError::MethodNotFound("system.pong".into()).to_json_rpc();
        assert_eq!(wire.code, -32601);
        assert_eq!(wire.data, Some(json!({"method": "system.pong"})));
    }

    #[test]
    fn test_invalid_params_carries_reason() {
        let wire: JsonRpcError = RpcError::invalid_params("chat.sendMessage", "missing field `message`").into();
        assert_eq!(wire.code, -32602);
        assert_eq!(wire.data.unwrap()["reason"], "missing field `message`");
    }

    #[test]
    fn test_registry_errors_map_to_hook_codes() {
        let not_found: RpcError = RegistryError::HookNotFound("h".into()).into();
        assert_eq!(not_found.code(), codes::HOOK_NOT_FOUND);

        let dup: RpcError = RegistryError::HookAlreadyExists("h".into()).into();
        assert_eq!(dup.code(), codes::HOOK_REGISTRATION_FAILED);
    }
}
