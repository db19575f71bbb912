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

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Validate;
use crate::methods::Method;
use crate::protocol::{JsonRpcId, JsonRpcResponse};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub pong: bool,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResult {
    pub name: String,
    pub version: String,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResult {
    pub methods: Vec<String>,
    pub namespaces: Vec<String>,
    pub hook_events: Vec<String>,
    pub transports: Vec<String>,
}

/// One entry of a `system.batch` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAction {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Echoed on the matching response; defaults to the entry's index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchParams {
    pub actions: Vec<BatchAction>,
    /// Run one action at a time instead of all at once.
    #[serde(default)]
    pub sequential: bool,
}

impl Validate for BatchParams {
    fn validate(&self) -> Result<(), String> {
        if let Some(nested) = self
            .actions
            .iter()
            .position(|a| a.method == Method::SystemBatch.as_str())
        {
            return Err(format!("action {} nests system.batch", nested));
        }
        Ok(())
    }
}

/// Responses in the same order as the submitted actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<JsonRpcResponse>,
}
