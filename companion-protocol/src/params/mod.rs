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

//! Typed params and results, one module per namespace group.
//!
//! Params deserialize from either an object (by name) or an array (by
//! position); a missing `params` field is read as `{}`.

pub mod chat;
pub mod config;
pub mod events;
pub mod hooks;
pub mod media;
pub mod scene;
pub mod system;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcError;

/// Checks that serde cannot express (ranges, mutually required fields).
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Params for methods that take none. Extra fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoParams {}

impl Validate for NoParams {}

/// Generic acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResult {
    pub success: bool,
}

impl AckResult {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// A point or Euler rotation in scene space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Validate for Vec3 {
    fn validate(&self) -> Result<(), String> {
        if self.is_finite() {
            Ok(())
        } else {
            Err("coordinates must be finite".into())
        }
    }
}

pub(crate) fn check_unit(name: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(format!("{} must be within 0..=1", name)),
        _ => Ok(()),
    }
}

pub(crate) fn check_non_empty(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", name))
    } else {
        Ok(())
    }
}

/// Deserialize and validate params for `method`.
pub fn decode_params<T>(method: &str, params: Option<Value>) -> Result<T, RpcError>
where
    T: DeserializeOwned + Validate,
{
    let raw = params.unwrap_or_else(|| Value::Object(Map::new()));
    let parsed: T =
        serde_json::from_value(raw).map_err(|e| RpcError::invalid_params(method, e.to_string()))?;
    parsed
        .validate()
        .map_err(|reason| RpcError::invalid_params(method, reason))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        text: String,
        #[serde(default)]
        count: u32,
    }

    impl Validate for Probe {
        fn validate(&self) -> Result<(), String> {
            check_non_empty("text", &self.text)
        }
    }

    #[test]
    fn test_missing_params_read_as_empty_object() {
        let _: NoParams = decode_params("system.ping", None).unwrap();
        let err = decode_params::<Probe>("x.probe", None).unwrap_err();
        assert!(matches!(err, RpcError::InvalidParams { .. }));
    }

    #[test]
    fn test_positional_params() {
        let p: Probe = decode_params("x.probe", Some(json!(["hi", 3]))).unwrap();
        assert_eq!((p.text.as_str(), p.count), ("hi", 3));
    }

    #[test]
    fn test_validation_failure_is_invalid_params() {
        let err = decode_params::<Probe>("x.probe", Some(json!({"text": "  "}))).unwrap_err();
        match err {
            RpcError::InvalidParams { method, reason } => {
                assert_eq!(method, "x.probe");
                assert!(reason.contains("text"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_is_invalid_params() {
        let err = decode_params::<Probe>("x.probe", Some(json!({"text": 5}))).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::INVALID_PARAMS);
    }
}
