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

//! `model.*`, `room.*`, `viewer.*` and `xr.*` params and results.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{check_non_empty, Validate, Vec3};

/// The two placeable scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneTarget {
    Model,
    Room,
}

impl fmt::Display for SceneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SceneTarget::Model => "model",
            SceneTarget::Room => "room",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAssetParams {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for LoadAssetParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("url", &self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

// =============================================================================
// Viewer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.4, 2.5),
            target: Vec3::new(0.0, 1.2, 0.0),
            fov: 45.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundState {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingState {
    pub intensity: f64,
    pub color: String,
    #[serde(default)]
    pub preset: Option<String>,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            color: "#ffffff".to_string(),
            preset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsState {
    pub enabled: bool,
    pub gravity: f64,
}

impl Default for PhysicsState {
    fn default() -> Self {
        Self {
            enabled: false,
            gravity: -9.81,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub camera: CameraState,
    pub background: BackgroundState,
    pub lighting: LightingState,
    pub physics: PhysicsState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetCameraParams {
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub target: Option<Vec3>,
    #[serde(default)]
    pub fov: Option<f64>,
}

impl Validate for SetCameraParams {
    fn validate(&self) -> Result<(), String> {
        for v in [self.position, self.target].iter().flatten() {
            v.validate()?;
        }
        match self.fov {
            Some(fov) if !(fov > 0.0 && fov < 180.0) => Err("fov must be within (0, 180)".into()),
            _ => Ok(()),
        }
    }
}

pub type SetBackgroundParams = BackgroundState;

impl Validate for BackgroundState {
    fn validate(&self) -> Result<(), String> {
        if self.color.is_none() && self.url.is_none() {
            Err("one of color or url is required".into())
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetLightingParams {
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

impl Validate for SetLightingParams {
    fn validate(&self) -> Result<(), String> {
        match self.intensity {
            Some(i) if !(i.is_finite() && i >= 0.0) => Err("intensity must be non-negative".into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPhysicsParams {
    pub enabled: bool,
    #[serde(default)]
    pub gravity: Option<f64>,
}

impl Validate for SetPhysicsParams {}

// =============================================================================
// XR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XrMode {
    ImmersiveVr,
    ImmersiveAr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartXrParams {
    pub mode: XrMode,
}

impl Validate for StartXrParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrSessionState {
    pub active: bool,
    pub mode: Option<XrMode>,
    pub foveation: f64,
    pub framebuffer_scale: f64,
}

impl Default for XrSessionState {
    fn default() -> Self {
        Self {
            active: false,
            mode: None,
            foveation: 0.0,
            framebuffer_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoveationParams {
    pub level: f64,
}

impl Validate for FoveationParams {
    fn validate(&self) -> Result<(), String> {
        super::check_unit("level", Some(self.level))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramebufferScaleParams {
    pub scale: f64,
}

impl Validate for FramebufferScaleParams {
    fn validate(&self) -> Result<(), String> {
        if self.scale.is_finite() && self.scale > 0.0 && self.scale <= 4.0 {
            Ok(())
        } else {
            Err("scale must be within (0, 4]".into())
        }
    }
}
