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

//! Collaborator interfaces
//!
//! The router never talks to a language model, speech engine or 3D scene
//! directly. It goes through these narrow async traits, which the host
//! application implements (the `memory` module has stand-ins).

use async_trait::async_trait;
use companion_protocol::params::chat::{ChatMessage, ChatState};
use companion_protocol::params::config::ScenarioState;
use companion_protocol::params::media::{PlaybackParams, ScreenshotResult, SendAudioParams};
use companion_protocol::params::scene::{
    BackgroundState, LoadAssetParams, SceneTarget, SetCameraParams, SetLightingParams, Transform,
    ViewerState, XrMode, XrSessionState,
};
use companion_protocol::{Namespace, RpcError, Vec3};
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    /// A precondition is not met (nothing loaded, no session, no backend).
    #[error("{0}")]
    Unavailable(String),

    /// The collaborator tried and failed.
    #[error("{0}")]
    Failed(String),
}

impl CollaboratorError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        CollaboratorError::Unavailable(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        CollaboratorError::Failed(message.into())
    }

    /// Map onto the application code owned by `namespace`.
    pub fn into_rpc(self, namespace: Namespace) -> RpcError {
        match self {
            CollaboratorError::Unavailable(message) => RpcError::StateUnavailable(message),
            CollaboratorError::Failed(message) => match namespace {
                Namespace::Chat => RpcError::Chat(message),
                Namespace::Config => RpcError::Config(message),
                Namespace::Scenario => RpcError::Scenario(message),
                Namespace::Model | Namespace::Room | Namespace::Viewer | Namespace::Xr => {
                    RpcError::Viewer(message)
                }
                _ => RpcError::ActionFailed(message),
            },
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Incremental reply text.
pub type ChunkStream = BoxStream<'static, CollaboratorResult<String>>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one user message and wait for the full reply.
    async fn send_message(&self, message: &str) -> CollaboratorResult<String>;

    /// Send one user message and stream the reply.
    async fn stream_message(&self, message: &str) -> CollaboratorResult<ChunkStream>;

    /// Stop whatever is in flight; returns whether anything was.
    async fn interrupt(&self) -> CollaboratorResult<bool>;

    async fn state(&self) -> CollaboratorResult<ChatState>;

    async fn messages(&self) -> CollaboratorResult<Vec<ChatMessage>>;

    async fn set_messages(&self, messages: Vec<ChatMessage>) -> CollaboratorResult<()>;

    async fn is_awake(&self) -> CollaboratorResult<bool>;

    async fn idle_time(&self) -> CollaboratorResult<Duration>;
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn send(&self, audio: SendAudioParams) -> CollaboratorResult<()>;

    async fn transcribe(
        &self,
        data: &str,
        format: Option<&str>,
        language: Option<&str>,
    ) -> CollaboratorResult<String>;

    async fn playback(&self, request: PlaybackParams) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait CharacterController: Send + Sync {
    async fn set_expression(&self, expression: &str, weight: f64) -> CollaboratorResult<()>;

    async fn set_emotion(&self, emotion: &str, intensity: f64) -> CollaboratorResult<()>;

    /// Speak `text`; returns the utterance length when known.
    async fn speak(&self, text: &str, emotion: Option<&str>) -> CollaboratorResult<Option<Duration>>;

    async fn stop_speaking(&self) -> CollaboratorResult<()>;

    async fn play_animation(&self, name: &str, looped: bool) -> CollaboratorResult<()>;

    async fn look_at(&self, target: Vec3) -> CollaboratorResult<()>;

    async fn set_auto_look_at(&self, enabled: bool) -> CollaboratorResult<()>;

    async fn set_auto_blink(&self, enabled: bool) -> CollaboratorResult<()>;

    async fn load_model(&self, url: &str) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn process_image(&self, image: &str, prompt: Option<&str>) -> CollaboratorResult<String>;

    async fn capture_screenshot(&self, format: Option<&str>) -> CollaboratorResult<ScreenshotResult>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> CollaboratorResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> CollaboratorResult<()>;

    async fn all(&self) -> CollaboratorResult<Map<String, Value>>;

    /// Apply several values at once.
    async fn update(&self, values: Map<String, Value>) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait ScenarioManager: Send + Sync {
    async fn load(&self, name: &str, options: Value) -> CollaboratorResult<ScenarioState>;

    /// Unload the active scenario; returns its name.
    async fn unload(&self) -> CollaboratorResult<String>;

    async fn state(&self) -> CollaboratorResult<ScenarioState>;
}

/// 3D scene: model and room placement, viewer and XR session.
#[async_trait]
pub trait SceneController: Send + Sync {
    async fn load(&self, target: SceneTarget, asset: LoadAssetParams) -> CollaboratorResult<()>;

    async fn unload(&self, target: SceneTarget) -> CollaboratorResult<()>;

    async fn set_position(&self, target: SceneTarget, position: Vec3) -> CollaboratorResult<Transform>;

    async fn set_rotation(&self, target: SceneTarget, rotation: Vec3) -> CollaboratorResult<Transform>;

    async fn set_scale(&self, target: SceneTarget, scale: Vec3) -> CollaboratorResult<Transform>;

    async fn transform(&self, target: SceneTarget) -> CollaboratorResult<Transform>;

    /// Load a Gaussian splat into the room.
    async fn load_splat(&self, url: &str) -> CollaboratorResult<()>;

    async fn viewer_state(&self) -> CollaboratorResult<ViewerState>;

    async fn set_camera(&self, camera: SetCameraParams) -> CollaboratorResult<ViewerState>;

    async fn reset_camera(&self) -> CollaboratorResult<ViewerState>;

    async fn set_background(&self, background: BackgroundState) -> CollaboratorResult<ViewerState>;

    async fn set_lighting(&self, lighting: SetLightingParams) -> CollaboratorResult<ViewerState>;

    async fn set_physics(&self, enabled: bool, gravity: Option<f64>) -> CollaboratorResult<ViewerState>;

    async fn screenshot(&self, format: Option<&str>) -> CollaboratorResult<ScreenshotResult>;

    async fn start_xr(&self, mode: XrMode) -> CollaboratorResult<XrSessionState>;

    async fn end_xr(&self) -> CollaboratorResult<()>;

    async fn xr_state(&self) -> CollaboratorResult<XrSessionState>;

    async fn set_foveation(&self, level: f64) -> CollaboratorResult<XrSessionState>;

    async fn set_framebuffer_scale(&self, scale: f64) -> CollaboratorResult<XrSessionState>;
}

/// Everything the router calls into, injected once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub chat: Arc<dyn ChatBackend>,
    pub audio: Arc<dyn AudioBackend>,
    pub character: Arc<dyn CharacterController>,
    pub vision: Arc<dyn VisionBackend>,
    pub config: Arc<dyn ConfigStore>,
    pub scenario: Arc<dyn ScenarioManager>,
    pub scene: Arc<dyn SceneController>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_protocol::codes;

    #[test]
    fn test_error_mapping_per_namespace() {
        let failed = || CollaboratorError::failed("boom");

        assert_eq!(failed().into_rpc(Namespace::Chat).code(), codes::CHAT_ERROR);
        assert_eq!(failed().into_rpc(Namespace::Config).code(), codes::CONFIG_ERROR);
        assert_eq!(failed().into_rpc(Namespace::Scenario).code(), codes::SCENARIO_ERROR);
        assert_eq!(failed().into_rpc(Namespace::Room).code(), codes::VIEWER_ERROR);
        assert_eq!(failed().into_rpc(Namespace::Xr).code(), codes::VIEWER_ERROR);
        assert_eq!(failed().into_rpc(Namespace::Character).code(), codes::ACTION_FAILED);

        let missing = CollaboratorError::unavailable("no model loaded");
        assert_eq!(missing.into_rpc(Namespace::Model).code(), codes::STATE_UNAVAILABLE);
    }
}
