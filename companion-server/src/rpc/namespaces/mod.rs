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

//! Method implementations, grouped by namespace.

pub(crate) mod chat;
pub(crate) mod config;
pub(crate) mod events;
pub(crate) mod hooks;
pub(crate) mod media;
pub(crate) mod scene;
pub(crate) mod system;

use companion_protocol::RpcError;
use serde::Serialize;
use serde_json::Value;

use super::handlers::CallResult;

/// Serialize a typed result.
pub(crate) fn respond<T: Serialize>(result: T) -> CallResult {
    serde_json::to_value(result)
        .map_err(|e| RpcError::Internal(format!("Failed to encode result: {}", e)))
}

/// A string field a hook may have rewritten.
pub(crate) fn string_field(context: &Value, key: &str) -> Option<String> {
    context.get(key).and_then(Value::as_str).map(str::to_string)
}

/// A hook asked for the request to be dropped.
pub(crate) fn is_cancelled(context: &Value) -> bool {
    context.get("cancel").and_then(Value::as_bool) == Some(true)
}
