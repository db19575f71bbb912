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

//! Hook configuration and declarative hook definitions.

use crate::condition::ConditionRule;
use crate::dispatcher::RegisterOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Configuration for the hook system.
///
/// # Example TOML Configuration
///
/// ```toml
/// enabled = true
/// default_timeout_ms = 2000
///
/// [[preload]]
/// event = "before:llm:request"
/// name = "tag-persona"
/// priority = 10
/// patch = { persona = "cheerful" }
///
/// [[preload]]
/// event = "after:llm:response"
/// condition = { path = "response", op = "lengthGt", value = 500 }
/// patch = { truncated = true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Global pipeline switch at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Timeout applied to hooks registered without one. Unset means no timeout.
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Hooks registered at startup.
    #[serde(default)]
    pub preload: Vec<HookDefinition>,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i32 {
    100
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_timeout_ms: None,
            preload: Vec::new(),
        }
    }
}

impl HookConfig {
    /// Create a new hook configuration from JSON string.
    pub fn from_json(json: &str) -> Result<Self, HookConfigError> {
        serde_json::from_str(json).map_err(|e| HookConfigError::ParseError(e.to_string()))
    }

    /// Create a new hook configuration from TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, HookConfigError> {
        toml::from_str(toml_str).map_err(|e| HookConfigError::ParseError(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), HookConfigError> {
        for (i, hook) in self.preload.iter().enumerate() {
            hook.validate().map_err(|e| HookConfigError::InvalidHook {
                index: i,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Declarative hook: an optional condition plus an object merged into the
/// context. Used both for preloading and for `hooks.register` over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    /// Event to hook into.
    pub event: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Lower values execute first.
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default, alias = "timeout_ms")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub condition: Option<ConditionRule>,

    /// Keys shallow-merged into the context.
    #[serde(default)]
    pub patch: Map<String, Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HookDefinition {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            name: None,
            priority: default_priority(),
            timeout_ms: None,
            condition: None,
            patch: Map::new(),
            enabled: default_enabled(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_patch(mut self, patch: Map<String, Value>) -> Self {
        self.patch = patch;
        self
    }

    pub fn with_condition(mut self, condition: ConditionRule) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Name shown by `hooks.list`.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("patch:{}", self.event))
    }

    /// Registration options derived from this definition.
    pub fn options(&self) -> RegisterOptions {
        let mut options = RegisterOptions::new()
            .with_name(self.display_name())
            .with_priority(self.priority)
            .with_enabled(self.enabled);
        if let Some(timeout_ms) = self.timeout_ms {
            options = options.with_timeout_ms(timeout_ms);
        }
        if let Some(condition) = &self.condition {
            options = options.with_condition(condition.clone());
        }
        options
    }

    /// Validate this hook definition.
    pub fn validate(&self) -> Result<(), HookConfigError> {
        if self.event.trim().is_empty() {
            return Err(HookConfigError::InvalidEventType(self.event.clone()));
        }
        if let Some(condition) = &self.condition {
            condition
                .validate()
                .map_err(|e| HookConfigError::InvalidCondition(e.to_string()))?;
        }
        Ok(())
    }
}

/// Errors that can occur during hook configuration.
#[derive(Debug, Error)]
pub enum HookConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid event type: {0:?}")]
    InvalidEventType(String),

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Invalid hook at index {index}: {reason}")]
    InvalidHook { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOp;

    #[test]
    fn test_parse_toml_config() {
        let config = HookConfig::from_toml(
            r#"
            default_timeout_ms = 2000

            [[preload]]
            event = "before:llm:request"
            priority = 10
            patch = { persona = "cheerful" }

            [[preload]]
            event = "after:llm:response"
            condition = { path = "response", op = "lengthGt", value = 500 }
            "#,
        )
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.default_timeout_ms, Some(2000));
        assert_eq!(config.preload.len(), 2);
        assert_eq!(config.preload[0].priority, 10);
        assert_eq!(config.preload[1].priority, 100);
        assert_eq!(
            config.preload[1].condition.as_ref().map(|c| c.op),
            Some(ConditionOp::LengthGt)
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_json_definition() {
        let def: HookDefinition = serde_json::from_str(
            r#"{"event": "before:tts", "timeoutMs": 50, "patch": {"voice": "soft"}}"#,
        )
        .unwrap();
        assert_eq!(def.timeout_ms, Some(50));
        assert_eq!(def.display_name(), "patch:before:tts");
        assert_eq!(def.options().timeout, Some(std::time::Duration::from_millis(50)));
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        let config = HookConfig {
            preload: vec![HookDefinition::new("   ")],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HookConfigError::InvalidHook { index: 0, .. })
        ));

        let def = HookDefinition::new("user:input").with_condition(ConditionRule::new(
            "message",
            ConditionOp::Equals,
            None,
        ));
        assert!(def.validate().is_err());
    }
}
