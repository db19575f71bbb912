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

//! RPC Request Handler
//!
//! Decodes frames, resolves `namespace.action` methods against the closed
//! method table and runs them. Every call is isolated: a panicking or
//! overrunning handler becomes an error response and nothing else.

use companion_hooks::HookDispatcher;
use companion_protocol::{
    decode, encode, Decoded, Incoming, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    MethodCall, RpcError,
};
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::batch;
use super::namespaces::{chat, config, events, hooks, media, scene, system};
use super::session::Session;
use crate::collaborators::Collaborators;
use crate::events::EventBus;

pub type CallResult = Result<Value, RpcError>;

const DEFAULT_MAX_BATCH: usize = 64;

/// Method router shared by every connection.
pub struct RpcHandler {
    pub(crate) hooks: Arc<HookDispatcher>,
    pub(crate) collaborators: Collaborators,
    pub(crate) events: EventBus,
    /// Live `chat.createStream` streams, cancelled by `chat.interrupt`.
    pub(crate) streams: Arc<DashMap<String, CancellationToken>>,
    max_batch_size: usize,
    request_timeout: Option<Duration>,
}

impl RpcHandler {
    pub fn new(hooks: Arc<HookDispatcher>, collaborators: Collaborators, events: EventBus) -> Self {
        Self {
            hooks,
            collaborators,
            events,
            streams: Arc::new(DashMap::new()),
            max_batch_size: DEFAULT_MAX_BATCH,
            request_timeout: None,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn hooks(&self) -> &Arc<HookDispatcher> {
        &self.hooks
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Handle one raw frame; `None` when nothing is owed to the peer.
    pub async fn handle_bytes(&self, bytes: &[u8], session: &Session) -> Option<String> {
        match decode(bytes) {
            Decoded::Single(Ok(incoming)) => self
                .handle_incoming(incoming, session)
                .await
                .map(|response| encode(&response)),
            Decoded::Single(Err(e)) => {
                debug!("Rejected frame: {}", e.error);
                Some(encode(&e.into_response()))
            }
            Decoded::Batch(items) => {
                if items.len() > self.max_batch_size {
                    let error = JsonRpcError::invalid_request(format!(
                        "Batch of {} exceeds the limit of {}",
                        items.len(),
                        self.max_batch_size
                    ));
                    return Some(encode(&JsonRpcResponse::error(JsonRpcId::Null, error)));
                }

                let responses: Vec<JsonRpcResponse> =
                    join_all(items.into_iter().map(|item| async move {
                        match item {
                            Ok(incoming) => self.handle_incoming(incoming, session).await,
                            Err(e) => Some(e.into_response()),
                        }
                    }))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();

                if responses.is_empty() {
                    None
                } else {
                    Some(encode(&responses))
                }
            }
        }
    }

    /// Requests get a response; notifications run and are never answered.
    pub async fn handle_incoming(
        &self,
        incoming: Incoming,
        session: &Session,
    ) -> Option<JsonRpcResponse> {
        match incoming {
            Incoming::Request(request) => Some(self.handle_request(request, session).await),
            Incoming::Notification(notification) => {
                if let Err(e) = self
                    .call(&notification.method, notification.params, session)
                    .await
                {
                    debug!(method = %notification.method, "Notification failed: {}", e);
                }
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest, session: &Session) -> JsonRpcResponse {
        debug!(method = %request.method, session = %session.id, "RPC request received");

        match self.call(&request.method, request.params, session).await {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => {
                if let RpcError::MethodNotFound(_) = e {
                    warn!(method = %request.method, "Unknown RPC method");
                }
                JsonRpcResponse::error(request.id, e.into())
            }
        }
    }

    /// Resolve and run one method.
    pub async fn call(&self, method: &str, params: Option<Value>, session: &Session) -> CallResult {
        match MethodCall::parse(method, params)? {
            MethodCall::SystemBatch(params) => batch::run(self, params, session).await,
            leaf => self.guarded(leaf, session).await,
        }
    }

    /// Run a non-batch call under the request timeout with panics caught.
    pub(crate) async fn guarded(&self, call: MethodCall, session: &Session) -> CallResult {
        let method = call.method();
        let run = AssertUnwindSafe(self.execute(call, session)).catch_unwind();

        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%method, "RPC call timed out after {:?}", limit);
                    return Err(RpcError::ActionFailed(format!(
                        "{} timed out after {} ms",
                        method,
                        limit.as_millis()
                    )));
                }
            },
            None => run.await,
        };

        outcome.unwrap_or_else(|_| {
            error!(%method, "RPC handler panicked");
            Err(RpcError::Internal(format!("{} handler panicked", method)))
        })
    }

    async fn execute(&self, call: MethodCall, session: &Session) -> CallResult {
        use MethodCall as M;
        use companion_protocol::params::scene::SceneTarget::{Model, Room};

        match call {
            // System
            M::SystemPing(_) => system::ping(),
            M::SystemGetVersion(_) => system::version(),
            M::SystemGetCapabilities(_) => system::capabilities(),
            M::SystemBatch(_) => Err(RpcError::invalid_params(
                "system.batch",
                "system.batch cannot be nested",
            )),

            // Hooks
            M::HooksRegister(p) => hooks::register(self, p),
            M::HooksUnregister(p) => hooks::unregister(self, p),
            M::HooksUnregisterAll(p) => hooks::unregister_all(self, p),
            M::HooksTrigger(p) => hooks::trigger(self, p).await,
            M::HooksList(p) => hooks::list(self, p),
            M::HooksGetMetrics(p) => hooks::metrics(self, p),
            M::HooksEnable(p) => hooks::toggle(self, p, true),
            M::HooksDisable(p) => hooks::toggle(self, p, false),
            M::HooksClear(_) => hooks::clear(self),

            // Chat
            M::ChatSendMessage(p) => chat::send_message(self, p).await,
            M::ChatCreateStream(p) => chat::create_stream(self, p).await,
            M::ChatInterrupt(_) => chat::interrupt(self).await,
            M::ChatGetState(_) => chat::state(self).await,
            M::ChatGetMessageList(_) => chat::messages(self).await,
            M::ChatSetMessageList(p) => chat::set_messages(self, p).await,
            M::ChatIsAwake(_) => chat::is_awake(self).await,
            M::ChatGetIdleTime(_) => chat::idle_time(self).await,

            // Audio, character, vision
            M::AudioSend(p) => media::send_audio(self, p).await,
            M::AudioTranscribe(p) => media::transcribe(self, p).await,
            M::AudioPlayback(p) => media::playback(self, p).await,
            M::CharacterSetExpression(p) => media::set_expression(self, p).await,
            M::CharacterSetEmotion(p) => media::set_emotion(self, p).await,
            M::CharacterSpeak(p) => media::speak(self, p).await,
            M::CharacterStopSpeaking(_) => media::stop_speaking(self).await,
            M::CharacterPlayAnimation(p) => media::play_animation(self, p).await,
            M::CharacterLookAt(p) => media::look_at(self, p).await,
            M::CharacterSetAutoLookAt(p) => media::set_auto_look_at(self, p).await,
            M::CharacterSetAutoBlink(p) => media::set_auto_blink(self, p).await,
            M::CharacterLoadModel(p) => media::load_model(self, p).await,
            M::VisionProcessImage(p) => media::process_image(self, p).await,
            M::VisionCaptureScreenshot(p) => media::capture_screenshot(self, p).await,

            // Config and scenario
            M::ConfigGet(p) => config::get(self, p).await,
            M::ConfigSet(p) => config::set(self, p).await,
            M::ConfigGetAll(_) => config::get_all(self).await,
            M::ConfigUpdate(p) => config::update(self, p).await,
            M::ScenarioLoad(p) => config::load_scenario(self, p).await,
            M::ScenarioUnload(_) => config::unload_scenario(self).await,
            M::ScenarioGetState(_) => config::scenario_state(self).await,

            // Model and room
            M::ModelLoad(p) => scene::load(self, Model, p).await,
            M::ModelUnload(_) => scene::unload(self, Model).await,
            M::ModelSetPosition(p) => scene::set_position(self, Model, p).await,
            M::ModelSetRotation(p) => scene::set_rotation(self, Model, p).await,
            M::ModelSetScale(p) => scene::set_scale(self, Model, p).await,
            M::ModelGetTransform(_) => scene::transform(self, Model).await,
            M::RoomLoad(p) => scene::load(self, Room, p).await,
            M::RoomUnload(_) => scene::unload(self, Room).await,
            M::RoomSetPosition(p) => scene::set_position(self, Room, p).await,
            M::RoomSetRotation(p) => scene::set_rotation(self, Room, p).await,
            M::RoomSetScale(p) => scene::set_scale(self, Room, p).await,
            M::RoomGetTransform(_) => scene::transform(self, Room).await,
            M::RoomLoadSplat(p) => scene::load_splat(self, p).await,

            // Viewer and XR
            M::ViewerGetState(_) => scene::viewer_state(self).await,
            M::ViewerSetCamera(p) => scene::set_camera(self, p).await,
            M::ViewerScreenshot(p) => scene::screenshot(self, p).await,
            M::ViewerResetCamera(_) => scene::reset_camera(self).await,
            M::ViewerSetBackground(p) => scene::set_background(self, p).await,
            M::ViewerSetLighting(p) => scene::set_lighting(self, p).await,
            M::ViewerSetPhysics(p) => scene::set_physics(self, p).await,
            M::XrStartSession(p) => scene::start_xr(self, p).await,
            M::XrEndSession(_) => scene::end_xr(self).await,
            M::XrGetSessionState(_) => scene::xr_state(self).await,
            M::XrSetFoveation(p) => scene::set_foveation(self, p).await,
            M::XrSetFramebufferScale(p) => scene::set_framebuffer_scale(self, p).await,

            // Events
            M::EventsSubscribe(p) => events::subscribe(self, p, session),
            M::EventsUnsubscribe(p) => events::unsubscribe(p, session),
            M::EventsListSubscriptions(_) => events::list(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ChatBackend, ChunkStream, CollaboratorResult};
    use async_trait::async_trait;
    use companion_protocol::params::chat::{ChatMessage, ChatState};
    use futures::stream;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Chat backend that counts `is_awake` calls and answers slowly.
    #[derive(Default)]
    struct CountingChat {
        awake_calls: AtomicUsize,
        reply_delay: Duration,
    }

    #[async_trait]
    impl ChatBackend for CountingChat {
        async fn send_message(&self, message: &str) -> CollaboratorResult<String> {
            tokio::time::sleep(self.reply_delay).await;
            Ok(format!("reply: {message}"))
        }

        async fn stream_message(&self, message: &str) -> CollaboratorResult<ChunkStream> {
            let reply = format!("reply: {message}");
            Ok(Box::pin(stream::iter(vec![Ok(reply)])))
        }

        async fn interrupt(&self) -> CollaboratorResult<bool> {
            Ok(false)
        }

        async fn state(&self) -> CollaboratorResult<ChatState> {
            Ok(ChatState {
                awake: true,
                processing: false,
                message_count: 0,
                idle_time_ms: 0,
            })
        }

        async fn messages(&self) -> CollaboratorResult<Vec<ChatMessage>> {
            Ok(Vec::new())
        }

        async fn set_messages(&self, _messages: Vec<ChatMessage>) -> CollaboratorResult<()> {
            Ok(())
        }

        async fn is_awake(&self) -> CollaboratorResult<bool> {
            self.awake_calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn idle_time(&self) -> CollaboratorResult<Duration> {
            Ok(Duration::ZERO)
        }
    }

    fn handler_with(chat: Arc<CountingChat>) -> RpcHandler {
        let mut collaborators = Collaborators::in_memory(None).unwrap();
        collaborators.chat = chat;
        RpcHandler::new(
            Arc::new(HookDispatcher::default()),
            collaborators,
            EventBus::default(),
        )
    }

    #[tokio::test]
    async fn test_is_awake_asks_backend_once() {
        let chat = Arc::new(CountingChat::default());
        let handler = handler_with(chat.clone());

        let result = handler
            .call("chat.isAwake", None, &Session::single_shot())
            .await
            .unwrap();

        assert_eq!(result, json!({"awake": true}));
        assert_eq!(chat.awake_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_batch_sees_earlier_writes() {
        let handler = handler_with(Arc::new(CountingChat::default()));
        let params = json!({
            "actions": [
                {"method": "config.set", "params": {"key": "voice", "value": "soft"}},
                {"method": "config.get", "params": {"key": "voice"}},
                {"method": "config.set", "params": {"key": "voice", "value": "bright"}},
                {"method": "config.get", "params": {"key": "voice"}}
            ],
            "sequential": true
        });

        let result = handler
            .call("system.batch", Some(params), &Session::single_shot())
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[1]["result"]["value"], "soft");
        assert_eq!(results[3]["result"]["value"], "bright");
    }

    #[tokio::test]
    async fn test_concurrent_batch_keeps_input_order() {
        let handler = handler_with(Arc::new(CountingChat {
            reply_delay: Duration::from_millis(50),
            ..Default::default()
        }));
        let params = json!({
            "actions": [
                {"method": "chat.sendMessage", "params": {"message": "slow"}, "id": "slow"},
                {"method": "system.ping", "id": "fast"},
                {"method": "nope.nope"}
            ]
        });

        let started = std::time::Instant::now();
        let result = handler
            .call("system.batch", Some(params), &Session::single_shot())
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();

        let ids: Vec<&Value> = results.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, [&json!("slow"), &json!("fast"), &json!(2)]);
        assert_eq!(results[0]["result"]["response"], "reply: slow");
        assert_eq!(results[1]["result"]["pong"], true);
        assert_eq!(results[2]["error"]["code"], -32601);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
