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

//! `audio.*`, `character.*` and `vision.*` params and results.
//!
//! Binary payloads travel as base64 strings; nothing here decodes them.

use serde::{Deserialize, Serialize};

use super::{check_non_empty, check_unit, Validate, Vec3};

// =============================================================================
// Audio
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAudioParams {
    pub data: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl Validate for SendAudioParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("data", &self.data)?;
        if self.sample_rate == Some(0) {
            return Err("sampleRate must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeParams {
    pub data: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Validate for TranscribeParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("data", &self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResult {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParams {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Validate for PlaybackParams {
    fn validate(&self) -> Result<(), String> {
        if self.data.is_none() && self.url.is_none() {
            return Err("one of data or url is required".into());
        }
        check_unit("volume", self.volume)
    }
}

// =============================================================================
// Character
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetExpressionParams {
    pub expression: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Validate for SetExpressionParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("expression", &self.expression)?;
        check_unit("weight", self.weight)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEmotionParams {
    pub emotion: String,
    #[serde(default)]
    pub intensity: Option<f64>,
}

impl Validate for SetEmotionParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("emotion", &self.emotion)?;
        check_unit("intensity", self.intensity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakParams {
    pub text: String,
    #[serde(default)]
    pub emotion: Option<String>,
}

impl Validate for SpeakParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("text", &self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakResult {
    /// Text actually spoken, after `before:tts` hooks.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayAnimationParams {
    pub name: String,
    #[serde(default, rename = "loop")]
    pub looped: bool,
}

impl Validate for PlayAnimationParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookAtParams {
    pub target: Vec3,
}

impl Validate for LookAtParams {
    fn validate(&self) -> Result<(), String> {
        self.target.validate()
    }
}

/// `character.setAutoLookAt` / `character.setAutoBlink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleParams {
    pub enabled: bool,
}

impl Validate for ToggleParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadModelParams {
    pub url: String,
}

impl Validate for LoadModelParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("url", &self.url)
    }
}

// =============================================================================
// Vision
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessImageParams {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Validate for ProcessImageParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("image", &self.image)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessImageResult {
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureParams {
    #[serde(default)]
    pub format: Option<String>,
}

impl Validate for CaptureParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotResult {
    pub image: String,
    pub format: String,
}
