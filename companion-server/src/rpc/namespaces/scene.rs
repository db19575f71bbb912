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

//! `model.*`, `room.*`, `viewer.*` and `xr.*`, all backed by the scene
//! controller.

use companion_protocol::params::media::CaptureParams;
use companion_protocol::params::scene::{
    BackgroundState, FoveationParams, FramebufferScaleParams, LoadAssetParams, SceneTarget,
    SetCameraParams, SetLightingParams, SetPhysicsParams, StartXrParams,
};
use companion_protocol::{AckResult, Namespace, RpcError, Vec3};
use serde_json::json;

use super::respond;
use crate::collaborators::CollaboratorError;
use crate::events::names;
use crate::rpc::handlers::{CallResult, RpcHandler};

fn target_error(target: SceneTarget) -> impl Fn(CollaboratorError) -> RpcError {
    let namespace = match target {
        SceneTarget::Model => Namespace::Model,
        SceneTarget::Room => Namespace::Room,
    };
    move |e| e.into_rpc(namespace)
}

fn viewer_error(e: CollaboratorError) -> RpcError {
    e.into_rpc(Namespace::Viewer)
}

fn xr_error(e: CollaboratorError) -> RpcError {
    e.into_rpc(Namespace::Xr)
}

// =============================================================================
// Model and room
// =============================================================================

pub(crate) async fn load(h: &RpcHandler, target: SceneTarget, params: LoadAssetParams) -> CallResult {
    h.collaborators
        .scene
        .load(target, params)
        .await
        .map_err(target_error(target))?;
    respond(AckResult::ok())
}

pub(crate) async fn unload(h: &RpcHandler, target: SceneTarget) -> CallResult {
    h.collaborators
        .scene
        .unload(target)
        .await
        .map_err(target_error(target))?;
    respond(AckResult::ok())
}

pub(crate) async fn set_position(h: &RpcHandler, target: SceneTarget, position: Vec3) -> CallResult {
    let transform = h
        .collaborators
        .scene
        .set_position(target, position)
        .await
        .map_err(target_error(target))?;
    respond(transform)
}

pub(crate) async fn set_rotation(h: &RpcHandler, target: SceneTarget, rotation: Vec3) -> CallResult {
    let transform = h
        .collaborators
        .scene
        .set_rotation(target, rotation)
        .await
        .map_err(target_error(target))?;
    respond(transform)
}

pub(crate) async fn set_scale(h: &RpcHandler, target: SceneTarget, scale: Vec3) -> CallResult {
    let transform = h
        .collaborators
        .scene
        .set_scale(target, scale)
        .await
        .map_err(target_error(target))?;
    respond(transform)
}

pub(crate) async fn transform(h: &RpcHandler, target: SceneTarget) -> CallResult {
    let transform = h
        .collaborators
        .scene
        .transform(target)
        .await
        .map_err(target_error(target))?;
    respond(transform)
}

pub(crate) async fn load_splat(h: &RpcHandler, params: LoadAssetParams) -> CallResult {
    h.collaborators
        .scene
        .load_splat(&params.url)
        .await
        .map_err(target_error(SceneTarget::Room))?;
    respond(AckResult::ok())
}

// =============================================================================
// Viewer
// =============================================================================

pub(crate) async fn viewer_state(h: &RpcHandler) -> CallResult {
    respond(h.collaborators.scene.viewer_state().await.map_err(viewer_error)?)
}

pub(crate) async fn set_camera(h: &RpcHandler, params: SetCameraParams) -> CallResult {
    respond(h.collaborators.scene.set_camera(params).await.map_err(viewer_error)?)
}

pub(crate) async fn reset_camera(h: &RpcHandler) -> CallResult {
    respond(h.collaborators.scene.reset_camera().await.map_err(viewer_error)?)
}

pub(crate) async fn screenshot(h: &RpcHandler, params: CaptureParams) -> CallResult {
    let shot = h
        .collaborators
        .scene
        .screenshot(params.format.as_deref())
        .await
        .map_err(viewer_error)?;
    respond(shot)
}

pub(crate) async fn set_background(h: &RpcHandler, params: BackgroundState) -> CallResult {
    respond(h.collaborators.scene.set_background(params).await.map_err(viewer_error)?)
}

pub(crate) async fn set_lighting(h: &RpcHandler, params: SetLightingParams) -> CallResult {
    respond(h.collaborators.scene.set_lighting(params).await.map_err(viewer_error)?)
}

pub(crate) async fn set_physics(h: &RpcHandler, params: SetPhysicsParams) -> CallResult {
    let state = h
        .collaborators
        .scene
        .set_physics(params.enabled, params.gravity)
        .await
        .map_err(viewer_error)?;
    respond(state)
}

// =============================================================================
// XR
// =============================================================================

pub(crate) async fn start_xr(h: &RpcHandler, params: StartXrParams) -> CallResult {
    let state = h
        .collaborators
        .scene
        .start_xr(params.mode)
        .await
        .map_err(xr_error)?;
    h.events.publish(names::XR_SESSION, &state);
    respond(state)
}

pub(crate) async fn end_xr(h: &RpcHandler) -> CallResult {
    h.collaborators.scene.end_xr().await.map_err(xr_error)?;
    h.events
        .publish(names::XR_SESSION, json!({ "active": false, "mode": null }));
    respond(AckResult::ok())
}

pub(crate) async fn xr_state(h: &RpcHandler) -> CallResult {
    respond(h.collaborators.scene.xr_state().await.map_err(xr_error)?)
}

pub(crate) async fn set_foveation(h: &RpcHandler, params: FoveationParams) -> CallResult {
    respond(
        h.collaborators
            .scene
            .set_foveation(params.level)
            .await
            .map_err(xr_error)?,
    )
}

pub(crate) async fn set_framebuffer_scale(
    h: &RpcHandler,
    params: FramebufferScaleParams,
) -> CallResult {
    respond(
        h.collaborators
            .scene
            .set_framebuffer_scale(params.scale)
            .await
            .map_err(xr_error)?,
    )
}
