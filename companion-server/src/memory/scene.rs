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

use async_trait::async_trait;
use companion_protocol::params::media::ScreenshotResult;
use companion_protocol::params::scene::{
    BackgroundState, CameraState, LoadAssetParams, SceneTarget, SetCameraParams,
    SetLightingParams, Transform, ViewerState, XrMode, XrSessionState,
};
use companion_protocol::Vec3;
use parking_lot::RwLock;

use super::media::blank_screenshot;
use crate::collaborators::{CollaboratorError, CollaboratorResult, SceneController};

#[derive(Debug, Clone)]
struct Placed {
    url: String,
    transform: Transform,
}

#[derive(Debug, Default)]
struct SceneInner {
    model: Option<Placed>,
    room: Option<Placed>,
    splat: Option<String>,
    viewer: ViewerState,
    xr: XrSessionState,
}

impl SceneInner {
    fn slot(&mut self, target: SceneTarget) -> &mut Option<Placed> {
        match target {
            SceneTarget::Model => &mut self.model,
            SceneTarget::Room => &mut self.room,
        }
    }

    fn placed(&mut self, target: SceneTarget) -> CollaboratorResult<&mut Placed> {
        self.slot(target)
            .as_mut()
            .ok_or_else(|| CollaboratorError::unavailable(format!("no {} is loaded", target)))
    }
}

/// Scene graph stand-in: tracks what is loaded, where it is and how the
/// viewer and XR session are configured.
pub struct MemoryScene {
    inner: RwLock<SceneInner>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SceneInner::default()),
        }
    }

    fn update_transform(
        &self,
        target: SceneTarget,
        f: impl FnOnce(&mut Transform),
    ) -> CollaboratorResult<Transform> {
        let mut inner = self.inner.write();
        let placed = inner.placed(target)?;
        f(&mut placed.transform);
        Ok(placed.transform)
    }

    fn update_viewer(&self, f: impl FnOnce(&mut ViewerState)) -> ViewerState {
        let mut inner = self.inner.write();
        f(&mut inner.viewer);
        inner.viewer.clone()
    }

    fn update_xr(&self, f: impl FnOnce(&mut XrSessionState)) -> XrSessionState {
        let mut inner = self.inner.write();
        f(&mut inner.xr);
        inner.xr.clone()
    }

    /// URL of the asset loaded into `target`.
    pub fn loaded(&self, target: SceneTarget) -> Option<String> {
        let inner = self.inner.read();
        let placed = match target {
            SceneTarget::Model => inner.model.as_ref(),
            SceneTarget::Room => inner.room.as_ref(),
        };
        placed.map(|p| p.url.clone())
    }
}

#[async_trait]
impl SceneController for MemoryScene {
    async fn load(&self, target: SceneTarget, asset: LoadAssetParams) -> CollaboratorResult<()> {
        *self.inner.write().slot(target) = Some(Placed {
            url: asset.url,
            transform: Transform::default(),
        });
        Ok(())
    }

    async fn unload(&self, target: SceneTarget) -> CollaboratorResult<()> {
        let mut inner = self.inner.write();
        match inner.slot(target).take() {
            Some(_) => {
                if target == SceneTarget::Room {
                    inner.splat = None;
                }
                Ok(())
            }
            None => Err(CollaboratorError::unavailable(format!("no {} is loaded", target))),
        }
    }

    async fn set_position(&self, target: SceneTarget, position: Vec3) -> CollaboratorResult<Transform> {
        self.update_transform(target, |t| t.position = position)
    }

    async fn set_rotation(&self, target: SceneTarget, rotation: Vec3) -> CollaboratorResult<Transform> {
        self.update_transform(target, |t| t.rotation = rotation)
    }

    async fn set_scale(&self, target: SceneTarget, scale: Vec3) -> CollaboratorResult<Transform> {
        self.update_transform(target, |t| t.scale = scale)
    }

    async fn transform(&self, target: SceneTarget) -> CollaboratorResult<Transform> {
        self.update_transform(target, |_| {})
    }

    async fn load_splat(&self, url: &str) -> CollaboratorResult<()> {
        let mut inner = self.inner.write();
        if inner.room.is_none() {
            inner.room = Some(Placed {
                url: url.to_string(),
                transform: Transform::default(),
            });
        }
        inner.splat = Some(url.to_string());
        Ok(())
    }

    async fn viewer_state(&self) -> CollaboratorResult<ViewerState> {
        Ok(self.inner.read().viewer.clone())
    }

    async fn set_camera(&self, camera: SetCameraParams) -> CollaboratorResult<ViewerState> {
        Ok(self.update_viewer(|viewer| {
            if let Some(position) = camera.position {
                viewer.camera.position = position;
            }
            if let Some(target) = camera.target {
                viewer.camera.target = target;
            }
            if let Some(fov) = camera.fov {
                viewer.camera.fov = fov;
            }
        }))
    }

    async fn reset_camera(&self) -> CollaboratorResult<ViewerState> {
        Ok(self.update_viewer(|viewer| viewer.camera = CameraState::default()))
    }

    async fn set_background(&self, background: BackgroundState) -> CollaboratorResult<ViewerState> {
        Ok(self.update_viewer(|viewer| viewer.background = background))
    }

    async fn set_lighting(&self, lighting: SetLightingParams) -> CollaboratorResult<ViewerState> {
        Ok(self.update_viewer(|viewer| {
            if let Some(intensity) = lighting.intensity {
                viewer.lighting.intensity = intensity;
            }
            if let Some(color) = lighting.color {
                viewer.lighting.color = color;
            }
            if lighting.preset.is_some() {
                viewer.lighting.preset = lighting.preset;
            }
        }))
    }

    async fn set_physics(&self, enabled: bool, gravity: Option<f64>) -> CollaboratorResult<ViewerState> {
        Ok(self.update_viewer(|viewer| {
            viewer.physics.enabled = enabled;
            if let Some(gravity) = gravity {
                viewer.physics.gravity = gravity;
            }
        }))
    }

    async fn screenshot(&self, format: Option<&str>) -> CollaboratorResult<ScreenshotResult> {
        blank_screenshot(format)
    }

    async fn start_xr(&self, mode: XrMode) -> CollaboratorResult<XrSessionState> {
        let mut inner = self.inner.write();
        if inner.xr.active {
            return Err(CollaboratorError::failed("an XR session is already active"));
        }
        inner.xr.active = true;
        inner.xr.mode = Some(mode);
        Ok(inner.xr.clone())
    }

    async fn end_xr(&self) -> CollaboratorResult<()> {
        let mut inner = self.inner.write();
        if !inner.xr.active {
            return Err(CollaboratorError::unavailable("no XR session is active"));
        }
        inner.xr.active = false;
        inner.xr.mode = None;
        Ok(())
    }

    async fn xr_state(&self) -> CollaboratorResult<XrSessionState> {
        Ok(self.inner.read().xr.clone())
    }

    async fn set_foveation(&self, level: f64) -> CollaboratorResult<XrSessionState> {
        Ok(self.update_xr(|xr| xr.foveation = level))
    }

    async fn set_framebuffer_scale(&self, scale: f64) -> CollaboratorResult<XrSessionState> {
        Ok(self.update_xr(|xr| xr.framebuffer_scale = scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(url: &str) -> LoadAssetParams {
        LoadAssetParams {
            url: url.to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_transform_requires_loaded_target() {
        let scene = MemoryScene::new();
        let err = scene
            .set_position(SceneTarget::Model, Vec3::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));

        scene.load(SceneTarget::Model, asset("avatar.vrm")).await.unwrap();
        let transform = scene
            .set_position(SceneTarget::Model, Vec3::new(1.0, 0.0, -2.0))
            .await
            .unwrap();
        assert_eq!(transform.position, Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(transform.scale, Vec3::ONE);
        assert_eq!(scene.loaded(SceneTarget::Model).as_deref(), Some("avatar.vrm"));

        scene.unload(SceneTarget::Model).await.unwrap();
        assert!(scene.transform(SceneTarget::Model).await.is_err());
    }

    #[tokio::test]
    async fn test_viewer_updates_are_partial() {
        let scene = MemoryScene::new();
        let state = scene
            .set_camera(SetCameraParams {
                fov: Some(60.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(state.camera.fov, 60.0);
        assert_eq!(state.camera.position, CameraState::default().position);

        let state = scene.reset_camera().await.unwrap();
        assert_eq!(state.camera, CameraState::default());
    }

    #[tokio::test]
    async fn test_xr_session_lifecycle() {
        let scene = MemoryScene::new();
        assert!(scene.end_xr().await.is_err());

        let state = scene.start_xr(XrMode::ImmersiveVr).await.unwrap();
        assert!(state.active);
        assert!(scene.start_xr(XrMode::ImmersiveAr).await.is_err());

        scene.set_foveation(0.5).await.unwrap();
        scene.end_xr().await.unwrap();
        let state = scene.xr_state().await.unwrap();
        assert!(!state.active);
        assert_eq!(state.foveation, 0.5);
    }
}
