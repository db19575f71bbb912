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

//! Per-hook execution conditions.
//!
//! A condition is either a declarative [`ConditionRule`] (serializable, so it
//! can arrive over the wire or from configuration) or an in-process predicate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::handlers::HookError;

/// Comparison applied by a [`ConditionRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOp {
    Exists,
    Equals,
    NotEquals,
    LengthGt,
    LengthLt,
    Gt,
    Lt,
    Contains,
}

impl ConditionOp {
    fn needs_value(self) -> bool {
        !matches!(self, ConditionOp::Exists)
    }

    fn needs_number(self) -> bool {
        matches!(
            self,
            ConditionOp::LengthGt | ConditionOp::LengthLt | ConditionOp::Gt | ConditionOp::Lt
        )
    }
}

/// Declarative condition over a dotted path into the context.
///
/// ```json
/// {"path": "response", "op": "lengthGt", "value": 500}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub path: String,
    pub op: ConditionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ConditionRule {
    pub fn new(path: impl Into<String>, op: ConditionOp, value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }

    pub fn validate(&self) -> Result<(), HookError> {
        if self.path.is_empty() {
            return Err(HookError::ConfigError("condition path cannot be empty".into()));
        }
        match (&self.value, self.op.needs_value(), self.op.needs_number()) {
            (None, true, _) => Err(HookError::ConfigError(format!(
                "condition {:?} requires a value",
                self.op
            ))),
            (Some(v), _, true) if !v.is_number() => Err(HookError::ConfigError(format!(
                "condition {:?} requires a numeric value",
                self.op
            ))),
            _ => Ok(()),
        }
    }

    pub fn evaluate(&self, context: &Value) -> bool {
        let target = lookup(context, &self.path);
        let expected = self.value.as_ref();

        match self.op {
            ConditionOp::Exists => target.map_or(false, |v| !v.is_null()),
            ConditionOp::Equals => target.is_some() && target == expected,
            ConditionOp::NotEquals => target != expected,
            ConditionOp::LengthGt => compare(target.and_then(length), expected, |a, b| a > b),
            ConditionOp::LengthLt => compare(target.and_then(length), expected, |a, b| a < b),
            ConditionOp::Gt => compare(target.and_then(Value::as_f64), expected, |a, b| a > b),
            ConditionOp::Lt => compare(target.and_then(Value::as_f64), expected, |a, b| a < b),
            ConditionOp::Contains => match (target, expected) {
                (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
                (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                (Some(Value::Object(map)), Some(Value::String(key))) => map.contains_key(key),
                _ => false,
            },
        }
    }
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn length(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        _ => None,
    }
}

fn compare(actual: Option<f64>, expected: Option<&Value>, cmp: fn(f64, f64) -> bool) -> bool {
    match (actual, expected.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Predicate over the context for in-process hooks.
pub type ContextPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Condition attached to a registered hook.
#[derive(Clone)]
pub enum Condition {
    Rule(ConditionRule),
    Predicate(ContextPredicate),
}

impl Condition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }

    pub fn evaluate(&self, context: &Value) -> bool {
        match self {
            Condition::Rule(rule) => rule.evaluate(context),
            Condition::Predicate(f) => f(context),
        }
    }

    /// The declarative form, if there is one.
    pub fn rule(&self) -> Option<&ConditionRule> {
        match self {
            Condition::Rule(rule) => Some(rule),
            Condition::Predicate(_) => None,
        }
    }
}

impl From<ConditionRule> for Condition {
    fn from(rule: ConditionRule) -> Self {
        Condition::Rule(rule)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Rule(rule) => f.debug_tuple("Rule").field(rule).finish(),
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
