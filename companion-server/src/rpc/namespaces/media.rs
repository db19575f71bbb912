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

//! `audio.*`, `character.*` and `vision.*`.

use companion_hooks::points;
use companion_protocol::params::media::{
    CaptureParams, LoadModelParams, LookAtParams, PlayAnimationParams, PlaybackParams,
    ProcessImageParams, ProcessImageResult, SendAudioParams, SetEmotionParams,
    SetExpressionParams, SpeakParams, SpeakResult, ToggleParams, TranscribeParams,
    TranscribeResult,
};
use companion_protocol::{AckResult, Namespace};
use serde_json::json;

use super::{respond, string_field};
use crate::events::names;
use crate::rpc::handlers::{CallResult, RpcHandler};

// =============================================================================
// Audio
// =============================================================================

pub(crate) async fn send_audio(h: &RpcHandler, params: SendAudioParams) -> CallResult {
    h.collaborators
        .audio
        .send(params)
        .await
        .map_err(|e| e.into_rpc(Namespace::Audio))?;
    respond(AckResult::ok())
}

pub(crate) async fn transcribe(h: &RpcHandler, params: TranscribeParams) -> CallResult {
    let text = h
        .collaborators
        .audio
        .transcribe(&params.data, params.format.as_deref(), params.language.as_deref())
        .await
        .map_err(|e| e.into_rpc(Namespace::Audio))?;
    respond(TranscribeResult { text })
}

pub(crate) async fn playback(h: &RpcHandler, params: PlaybackParams) -> CallResult {
    h.collaborators
        .audio
        .playback(params)
        .await
        .map_err(|e| e.into_rpc(Namespace::Audio))?;
    respond(AckResult::ok())
}

// =============================================================================
// Character
// =============================================================================

pub(crate) async fn set_expression(h: &RpcHandler, params: SetExpressionParams) -> CallResult {
    let weight = params.weight.unwrap_or(1.0);
    h.collaborators
        .character
        .set_expression(&params.expression, weight)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    h.events.publish(
        names::CHARACTER_EXPRESSION,
        json!({ "expression": params.expression, "weight": weight }),
    );
    respond(AckResult::ok())
}

pub(crate) async fn set_emotion(h: &RpcHandler, params: SetEmotionParams) -> CallResult {
    h.collaborators
        .character
        .set_emotion(&params.emotion, params.intensity.unwrap_or(1.0))
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

/// `before:tts` may rewrite the text or emotion; `after:tts` sees what was
/// spoken.
pub(crate) async fn speak(h: &RpcHandler, params: SpeakParams) -> CallResult {
    let mut context = json!({ "text": &params.text });
    if let Some(emotion) = &params.emotion {
        context["emotion"] = json!(emotion);
    }
    let context = h.hooks.trigger(points::BEFORE_TTS, context).await;
    let text = string_field(&context, "text").unwrap_or(params.text);
    let emotion = string_field(&context, "emotion").or(params.emotion);

    let duration = h
        .collaborators
        .character
        .speak(&text, emotion.as_deref())
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;

    h.hooks
        .trigger(points::AFTER_TTS, json!({ "text": &text }))
        .await;

    respond(SpeakResult {
        text,
        duration_ms: duration.map(|d| d.as_millis() as u64),
    })
}

pub(crate) async fn stop_speaking(h: &RpcHandler) -> CallResult {
    h.collaborators
        .character
        .stop_speaking()
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

pub(crate) async fn play_animation(h: &RpcHandler, params: PlayAnimationParams) -> CallResult {
    h.collaborators
        .character
        .play_animation(&params.name, params.looped)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

pub(crate) async fn look_at(h: &RpcHandler, params: LookAtParams) -> CallResult {
    h.collaborators
        .character
        .look_at(params.target)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

pub(crate) async fn set_auto_look_at(h: &RpcHandler, params: ToggleParams) -> CallResult {
    h.collaborators
        .character
        .set_auto_look_at(params.enabled)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

pub(crate) async fn set_auto_blink(h: &RpcHandler, params: ToggleParams) -> CallResult {
    h.collaborators
        .character
        .set_auto_blink(params.enabled)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

pub(crate) async fn load_model(h: &RpcHandler, params: LoadModelParams) -> CallResult {
    h.collaborators
        .character
        .load_model(&params.url)
        .await
        .map_err(|e| e.into_rpc(Namespace::Character))?;
    respond(AckResult::ok())
}

// =============================================================================
// Vision
// =============================================================================

pub(crate) async fn process_image(h: &RpcHandler, params: ProcessImageParams) -> CallResult {
    let mut context = json!({ "image": &params.image });
    if let Some(prompt) = &params.prompt {
        context["prompt"] = json!(prompt);
    }
    let context = h.hooks.trigger(points::BEFORE_VISION, context).await;
    let image = string_field(&context, "image").unwrap_or(params.image);
    let prompt = string_field(&context, "prompt").or(params.prompt);

    let description = h
        .collaborators
        .vision
        .process_image(&image, prompt.as_deref())
        .await
        .map_err(|e| e.into_rpc(Namespace::Vision))?;

    let context = h
        .hooks
        .trigger(points::AFTER_VISION, json!({ "description": &description }))
        .await;
    let description = string_field(&context, "description").unwrap_or(description);

    respond(ProcessImageResult { description })
}

pub(crate) async fn capture_screenshot(h: &RpcHandler, params: CaptureParams) -> CallResult {
    let shot = h
        .collaborators
        .vision
        .capture_screenshot(params.format.as_deref())
        .await
        .map_err(|e| e.into_rpc(Namespace::Vision))?;
    respond(shot)
}
