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

//! `hooks.*` params and results.

use companion_hooks::{HookDefinition, HookInfo, HookMetrics};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{check_non_empty, Validate};

/// `hooks.register` takes a declarative definition.
pub type RegisterHookParams = HookDefinition;

impl Validate for HookDefinition {
    fn validate(&self) -> Result<(), String> {
        HookDefinition::validate(self).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterHookResult {
    pub hook_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookIdParams {
    pub hook_id: String,
}

impl Validate for HookIdParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedResult {
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    pub event: String,
}

impl Validate for EventParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("event", &self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedCountResult {
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerParams {
    pub event: String,
    #[serde(default = "empty_context")]
    pub context: Value,
}

fn empty_context() -> Value {
    Value::Object(Map::new())
}

impl Validate for TriggerParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("event", &self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub context: Value,
    /// Hooks invoked (condition skips excluded).
    pub executed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListHooksParams {
    #[serde(default)]
    pub event: Option<String>,
}

impl Validate for ListHooksParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListHooksResult {
    pub hooks: Vec<HookInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMetricsParams {
    #[serde(default)]
    pub hook_id: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

impl Validate for GetMetricsParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub metrics: Vec<HookMetrics>,
}

/// `hooks.enable` / `hooks.disable`: the whole pipeline, or one hook when
/// `hookId` is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleHooksParams {
    #[serde(default)]
    pub hook_id: Option<String>,
}

impl Validate for ToggleHooksParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HooksStateResult {
    pub enabled: bool,
    pub hook_count: usize,
}
