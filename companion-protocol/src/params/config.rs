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

//! `config.*` and `scenario.*` params and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{check_non_empty, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigKeyParams {
    pub key: String,
}

impl Validate for ConfigKeyParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("key", &self.key)
    }
}

/// `config.get` result; `value` is null for unknown keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValueResult {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetConfigParams {
    pub key: String,
    pub value: Value,
}

impl Validate for SetConfigParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("key", &self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfigParams {
    pub values: Map<String, Value>,
}

impl Validate for UpdateConfigParams {
    fn validate(&self) -> Result<(), String> {
        if self.values.is_empty() {
            return Err("values cannot be empty".into());
        }
        self.values.keys().try_for_each(|k| check_non_empty("key", k))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadScenarioParams {
    pub name: String,
    #[serde(default)]
    pub options: Value,
}

impl Validate for LoadScenarioParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub active: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub options: Value,
}

impl ScenarioState {
    pub fn idle() -> Self {
        Self {
            active: false,
            name: None,
            options: Value::Null,
        }
    }
}
