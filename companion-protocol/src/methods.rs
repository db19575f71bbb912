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

//! The closed method table.
//!
//! Every callable method is one row: its wire name, its namespace and the
//! params type checked at the router boundary. The table generates
//! [`Method`] (names) and [`MethodCall`] (name plus decoded params).

use serde_json::Value;
use std::fmt;

use crate::error::RpcError;
use crate::params::chat::{MessageList, SendMessageParams};
use crate::params::config::{
    ConfigKeyParams, LoadScenarioParams, SetConfigParams, UpdateConfigParams,
};
use crate::params::events::{SubscribeParams, UnsubscribeParams};
use crate::params::hooks::{
    EventParams, GetMetricsParams, HookIdParams, ListHooksParams, RegisterHookParams,
    ToggleHooksParams, TriggerParams,
};
use crate::params::media::{
    CaptureParams, LoadModelParams, LookAtParams, PlayAnimationParams, PlaybackParams,
    ProcessImageParams, SendAudioParams, SetEmotionParams, SetExpressionParams, SpeakParams,
    ToggleParams, TranscribeParams,
};
use crate::params::scene::{
    FoveationParams, FramebufferScaleParams, LoadAssetParams, SetBackgroundParams,
    SetCameraParams, SetLightingParams, SetPhysicsParams, StartXrParams,
};
use crate::params::system::BatchParams;
use crate::params::{decode_params, NoParams, Vec3};

/// Method namespaces, the part before the dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    System,
    Hooks,
    Chat,
    Audio,
    Character,
    Vision,
    Config,
    Scenario,
    Model,
    Room,
    Viewer,
    Xr,
    Events,
}

impl Namespace {
    pub const ALL: &'static [Namespace] = &[
        Namespace::System,
        Namespace::Hooks,
        Namespace::Chat,
        Namespace::Audio,
        Namespace::Character,
        Namespace::Vision,
        Namespace::Config,
        Namespace::Scenario,
        Namespace::Model,
        Namespace::Room,
        Namespace::Viewer,
        Namespace::Xr,
        Namespace::Events,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::System => "system",
            Namespace::Hooks => "hooks",
            Namespace::Chat => "chat",
            Namespace::Audio => "audio",
            Namespace::Character => "character",
            Namespace::Vision => "vision",
            Namespace::Config => "config",
            Namespace::Scenario => "scenario",
            Namespace::Model => "model",
            Namespace::Room => "room",
            Namespace::Viewer => "viewer",
            Namespace::Xr => "xr",
            Namespace::Events => "events",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! method_table {
    ($( $variant:ident => $name:literal, $ns:ident, $params:ty; )*) => {
        /// Every method the router knows.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Method {
            $( $variant, )*
        }

        impl Method {
            pub const ALL: &'static [Method] = &[ $( Method::$variant, )* ];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( Method::$variant => $name, )*
                }
            }

            pub fn from_name(name: &str) -> Option<Method> {
                match name {
                    $( $name => Some(Method::$variant), )*
                    _ => None,
                }
            }

            pub fn namespace(self) -> Namespace {
                match self {
                    $( Method::$variant => Namespace::$ns, )*
                }
            }
        }

        /// A method together with its decoded, validated params.
        #[derive(Debug, Clone)]
        pub enum MethodCall {
            $( $variant($params), )*
        }

        impl MethodCall {
            /// Decode `params` for an already-resolved method.
            pub fn from_method(method: Method, params: Option<Value>) -> Result<Self, RpcError> {
                Ok(match method {
                    $( Method::$variant => MethodCall::$variant(decode_params($name, params)?), )*
                })
            }

            pub fn method(&self) -> Method {
                match self {
                    $( MethodCall::$variant(_) => Method::$variant, )*
                }
            }
        }
    };
}

method_table! {
    SystemPing => "system.ping", System, NoParams;
    SystemGetVersion => "system.getVersion", System, NoParams;
    SystemGetCapabilities => "system.getCapabilities", System, NoParams;
    SystemBatch => "system.batch", System, BatchParams;

    HooksRegister => "hooks.register", Hooks, RegisterHookParams;
    HooksUnregister => "hooks.unregister", Hooks, HookIdParams;
    HooksUnregisterAll => "hooks.unregisterAll", Hooks, EventParams;
    HooksTrigger => "hooks.trigger", Hooks, TriggerParams;
    HooksList => "hooks.list", Hooks, ListHooksParams;
    HooksGetMetrics => "hooks.getMetrics", Hooks, GetMetricsParams;
    HooksEnable => "hooks.enable", Hooks, ToggleHooksParams;
    HooksDisable => "hooks.disable", Hooks, ToggleHooksParams;
    HooksClear => "hooks.clear", Hooks, NoParams;

    ChatSendMessage => "chat.sendMessage", Chat, SendMessageParams;
    ChatCreateStream => "chat.createStream", Chat, SendMessageParams;
    ChatInterrupt => "chat.interrupt", Chat, NoParams;
    ChatGetState => "chat.getState", Chat, NoParams;
    ChatGetMessageList => "chat.getMessageList", Chat, NoParams;
    ChatSetMessageList => "chat.setMessageList", Chat, MessageList;
    ChatIsAwake => "chat.isAwake", Chat, NoParams;
    ChatGetIdleTime => "chat.getIdleTime", Chat, NoParams;

    AudioSend => "audio.send", Audio, SendAudioParams;
    AudioTranscribe => "audio.transcribe", Audio, TranscribeParams;
    AudioPlayback => "audio.playback", Audio, PlaybackParams;

    CharacterSetExpression => "character.setExpression", Character, SetExpressionParams;
    CharacterSetEmotion => "character.setEmotion", Character, SetEmotionParams;
    CharacterSpeak => "character.speak", Character, SpeakParams;
    CharacterStopSpeaking => "character.stopSpeaking", Character, NoParams;
    CharacterPlayAnimation => "character.playAnimation", Character, PlayAnimationParams;
    CharacterLookAt => "character.lookAt", Character, LookAtParams;
    CharacterSetAutoLookAt => "character.setAutoLookAt", Character, ToggleParams;
    CharacterSetAutoBlink => "character.setAutoBlink", Character, ToggleParams;
    CharacterLoadModel => "character.loadModel", Character, LoadModelParams;

    VisionProcessImage => "vision.processImage", Vision, ProcessImageParams;
    VisionCaptureScreenshot => "vision.captureScreenshot", Vision, CaptureParams;

    ConfigGet => "config.get", Config, ConfigKeyParams;
    ConfigSet => "config.set", Config, SetConfigParams;
    ConfigGetAll => "config.getAll", Config, NoParams;
    ConfigUpdate => "config.update", Config, UpdateConfigParams;

    ScenarioLoad => "scenario.load", Scenario, LoadScenarioParams;
    ScenarioUnload => "scenario.unload", Scenario, NoParams;
    ScenarioGetState => "scenario.getState", Scenario, NoParams;

    ModelLoad => "model.load", Model, LoadAssetParams;
    ModelUnload => "model.unload", Model, NoParams;
    ModelSetPosition => "model.setPosition", Model, Vec3;
    ModelSetRotation => "model.setRotation", Model, Vec3;
    ModelSetScale => "model.setScale", Model, Vec3;
    ModelGetTransform => "model.getTransform", Model, NoParams;

    RoomLoad => "room.load", Room, LoadAssetParams;
    RoomUnload => "room.unload", Room, NoParams;
    RoomSetPosition => "room.setPosition", Room, Vec3;
    RoomSetRotation => "room.setRotation", Room, Vec3;
    RoomSetScale => "room.setScale", Room, Vec3;
    RoomGetTransform => "room.getTransform", Room, NoParams;
    RoomLoadSplat => "room.loadSplat", Room, LoadAssetParams;

    ViewerGetState => "viewer.getState", Viewer, NoParams;
    ViewerSetCamera => "viewer.setCamera", Viewer, SetCameraParams;
    ViewerScreenshot => "viewer.screenshot", Viewer, CaptureParams;
    ViewerResetCamera => "viewer.resetCamera", Viewer, NoParams;
    ViewerSetBackground => "viewer.setBackground", Viewer, SetBackgroundParams;
    ViewerSetLighting => "viewer.setLighting", Viewer, SetLightingParams;
    ViewerSetPhysics => "viewer.setPhysics", Viewer, SetPhysicsParams;

    XrStartSession => "xr.startSession", Xr, StartXrParams;
    XrEndSession => "xr.endSession", Xr, NoParams;
    XrGetSessionState => "xr.getSessionState", Xr, NoParams;
    XrSetFoveation => "xr.setFoveation", Xr, FoveationParams;
    XrSetFramebufferScale => "xr.setFramebufferScale", Xr, FramebufferScaleParams;

    EventsSubscribe => "events.subscribe", Events, SubscribeParams;
    EventsUnsubscribe => "events.unsubscribe", Events, UnsubscribeParams;
    EventsListSubscriptions => "events.listSubscriptions", Events, NoParams;
}

impl MethodCall {
    /// Resolve the method name and decode its params.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Self, RpcError> {
        let resolved =
            Method::from_name(method).ok_or_else(|| RpcError::MethodNotFound(method.to_string()))?;
        Self::from_method(resolved, params)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_names_round_trip_and_match_namespace() {
        for m in Method::ALL {
            assert_eq!(Method::from_name(m.as_str()), Some(*m));
            let prefix = m.as_str().split('.').next().unwrap();
            assert_eq!(prefix, m.namespace().as_str());
        }
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Method::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), Method::ALL.len());
    }

    #[test]
    fn test_every_namespace_has_methods() {
        for ns in Namespace::ALL {
            assert!(Method::ALL.iter().any(|m| m.namespace() == *ns), "{ns} is empty");
        }
    }

    #[test]
    fn test_unknown_method() {
        let err = MethodCall::parse("system.pong", None).unwrap_err();
        assert_eq!(err, RpcError::MethodNotFound("system.pong".into()));
    }

    #[test]
    fn test_parse_typed_params() {
        let call = MethodCall::parse("chat.sendMessage", Some(json!({"message": "hi"}))).unwrap();
        match call {
            MethodCall::ChatSendMessage(p) => assert_eq!(p.message, "hi"),
            other => panic!("unexpected {other:?}"),
        }

        let err = MethodCall::parse("chat.sendMessage", Some(json!({"msg": "hi"}))).unwrap_err();
        assert!(matches!(err, RpcError::InvalidParams { ref method, .. } if method == "chat.sendMessage"));
    }

    #[test]
    fn test_nested_batch_rejected_at_decode() {
        let err = MethodCall::parse(
            "system.batch",
            Some(json!({"actions": [{"method": "system.batch", "params": {"actions": []}}]})),
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::INVALID_PARAMS);
    }

    #[test]
    fn test_xr_mode_wire_names() {
        let call = MethodCall::parse("xr.startSession", Some(json!({"mode": "immersive-ar"}))).unwrap();
        assert_eq!(call.method(), Method::XrStartSession);
    }
}
