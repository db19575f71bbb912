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

// End-to-end tests: a real server on an ephemeral port, driven over HTTP
// with reqwest and over WebSocket with companion-client.

use async_trait::async_trait;
use companion_client::{ClientConfig, ClientError, RpcClient};
use companion_protocol::codes;
use companion_protocol::params::chat::{ChatMessage, ChatState};
use companion_protocol::params::events::EVENT_NOTIFICATION;
use companion_server::collaborators::{ChatBackend, ChunkStream, CollaboratorResult, Collaborators};
use companion_server::memory::EchoChatBackend;
use companion_server::config::ServerConfig;
use companion_server::{build_app, paths, serve};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const WAIT: Duration = Duration::from_secs(5);

/// Echo chat that takes `delay` to answer `send_message`.
struct SlowChat {
    inner: EchoChatBackend,
    delay: Duration,
}

#[async_trait]
impl ChatBackend for SlowChat {
    async fn send_message(&self, message: &str) -> CollaboratorResult<String> {
        tokio::time::sleep(self.delay).await;
        self.inner.send_message(message).await
    }

    async fn stream_message(&self, message: &str) -> CollaboratorResult<ChunkStream> {
        self.inner.stream_message(message).await
    }

    async fn interrupt(&self) -> CollaboratorResult<bool> {
        self.inner.interrupt().await
    }

    async fn state(&self) -> CollaboratorResult<ChatState> {
        self.inner.state().await
    }

    async fn messages(&self) -> CollaboratorResult<Vec<ChatMessage>> {
        self.inner.messages().await
    }

    async fn set_messages(&self, messages: Vec<ChatMessage>) -> CollaboratorResult<()> {
        self.inner.set_messages(messages).await
    }

    async fn is_awake(&self) -> CollaboratorResult<bool> {
        self.inner.is_awake().await
    }

    async fn idle_time(&self) -> CollaboratorResult<Duration> {
        self.inner.idle_time().await
    }
}

struct TestServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(Collaborators::in_memory(None).unwrap()).await
    }

    async fn start_with(collaborators: Collaborators) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_app(&ServerConfig::default(), collaborators).unwrap();

        let (shutdown, stop) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = serve(listener, app, async {
                let _ = stop.await;
            })
            .await;
        });

        Self {
            addr,
            _shutdown: shutdown,
        }
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.http_url(paths::RPC_HTTP))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn client(&self) -> RpcClient {
        let config = ClientConfig::new(format!("ws://{}{}", self.addr, paths::RPC_WS))
            .with_request_timeout(WAIT);
        RpcClient::connect(config).await.unwrap()
    }
}

#[tokio::test]
async fn test_http_ping() {
    let server = TestServer::start().await;
    let response = server
        .post(json!({"jsonrpc": "2.0", "method": "system.ping", "id": 1}))
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["pong"], true);
    assert!(body["result"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_http_errors() {
    let server = TestServer::start().await;

    let body: Value = server
        .post(json!({"jsonrpc": "2.0", "method": "nope.nope", "id": "a"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], "a");
    assert_eq!(body["error"]["code"], codes::METHOD_NOT_FOUND);

    let body: Value = server
        .post(json!({"jsonrpc": "2.0", "method": "chat.sendMessage", "params": {}, "id": 2}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["error"]["code"], codes::INVALID_PARAMS);

    // Subscriptions need a duplex connection.
    let body: Value = server
        .post(json!({
            "jsonrpc": "2.0",
            "method": "events.subscribe",
            "params": {"events": ["chat.message"]},
            "id": 3
        }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["error"]["code"], codes::STATE_UNAVAILABLE);

    let response = reqwest::Client::new()
        .post(server.http_url(paths::RPC_HTTP))
        .body("{not json")
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_http_notification_has_no_body() {
    let server = TestServer::start().await;
    let response = server
        .post(json!({"jsonrpc": "2.0", "method": "system.ping"}))
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_http_batch_array() {
    let server = TestServer::start().await;
    let body: Value = server
        .post(json!([
            {"jsonrpc": "2.0", "method": "system.ping", "id": 1},
            {"jsonrpc": "2.0", "method": "system.ping"},
            {"jsonrpc": "2.0", "method": "system.version", "id": 2}
        ]))
        .await
        .json()
        .await
        .unwrap();

    let replies = body.as_array().unwrap();
    assert_eq!(replies.len(), 2);
    let ids: Vec<&Value> = replies.iter().map(|r| &r["id"]).collect();
    assert!(ids.contains(&&json!(1)));
    assert!(ids.contains(&&json!(2)));
}

#[tokio::test]
async fn test_system_batch_keeps_order() {
    let server = TestServer::start().await;
    let body: Value = server
        .post(json!({
            "jsonrpc": "2.0",
            "method": "system.batch",
            "params": {
                "actions": [
                    {"method": "config.set", "params": {"key": "voice", "value": "soft"}},
                    {"method": "nope.nope", "id": "bad"},
                    {"method": "system.ping"}
                ],
                "sequential": true
            },
            "id": 9
        }))
        .await
        .json()
        .await
        .unwrap();

    let results = body["result"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["id"], 0);
    assert!(results[0].get("error").is_none());
    assert_eq!(results[1]["id"], "bad");
    assert_eq!(results[1]["error"]["code"], codes::METHOD_NOT_FOUND);
    assert_eq!(results[2]["id"], 2);
    assert_eq!(results[2]["result"]["pong"], true);
}

#[tokio::test]
async fn test_system_batch_runs_concurrently_in_input_order() {
    let mut collaborators = Collaborators::in_memory(None).unwrap();
    collaborators.chat = Arc::new(SlowChat {
        inner: EchoChatBackend::new(),
        delay: Duration::from_millis(100),
    });
    let server = TestServer::start_with(collaborators).await;

    let body: Value = server
        .post(json!({
            "jsonrpc": "2.0",
            "method": "system.batch",
            "params": {
                "actions": [
                    {"method": "chat.sendMessage", "params": {"message": "one"}, "id": "a"},
                    {"method": "chat.sendMessage", "params": {"message": "two"}, "id": "b"},
                    {"method": "system.ping", "id": "c"}
                ]
            },
            "id": 1
        }))
        .await
        .json()
        .await
        .unwrap();

    let results = body["result"]["results"].as_array().unwrap();
    let ids: Vec<&Value> = results.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, [&json!("a"), &json!("b"), &json!("c")]);
    assert_eq!(results[0]["result"]["response"], "You said: one");
    assert_eq!(results[1]["result"]["response"], "You said: two");
    assert_eq!(results[2]["result"]["pong"], true);
}

#[tokio::test]
async fn test_sequential_batch_sees_earlier_writes() {
    let server = TestServer::start().await;
    let body: Value = server
        .post(json!({
            "jsonrpc": "2.0",
            "method": "system.batch",
            "params": {
                "actions": [
                    {"method": "config.set", "params": {"key": "voice", "value": "soft"}},
                    {"method": "config.get", "params": {"key": "voice"}}
                ],
                "sequential": true
            },
            "id": 1
        }))
        .await
        .json()
        .await
        .unwrap();

    let results = body["result"]["results"].as_array().unwrap();
    assert!(results[0].get("error").is_none());
    assert_eq!(results[1]["result"]["value"], "soft");
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;
    let body: Value = reqwest::get(server.http_url(paths::RPC_HEALTH))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["session"], "companion");
    assert_eq!(body["hooks"]["enabled"], true);
    assert!(body["connectedClients"].is_u64());
}

#[tokio::test]
async fn test_ws_hook_patches_chat_request() {
    let server = TestServer::start().await;
    let client = server.client().await;

    let registered = client
        .call(
            "hooks.register",
            Some(json!({
                "event": "before:llm:request",
                "name": "rewrite",
                "patch": {"message": "patched"}
            })),
        )
        .await
        .unwrap();
    let hook_id = registered["hookId"].as_str().unwrap().to_string();

    let reply = client
        .call("chat.sendMessage", Some(json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(reply["response"], "You said: patched");
    assert_eq!(reply["cancelled"], false);

    let metrics = client
        .call("hooks.getMetrics", Some(json!({"hookId": hook_id})))
        .await
        .unwrap();
    assert_eq!(metrics["metrics"][0]["calls"], 1);

    let removed = client
        .call("hooks.unregister", Some(json!({"hookId": hook_id})))
        .await
        .unwrap();
    assert_eq!(removed["removed"], true);

    let err = client
        .call("hooks.unregister", Some(json!({"hookId": hook_id})))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::HOOK_NOT_FOUND));

    client.shutdown().await;
}

#[tokio::test]
async fn test_ws_hook_can_cancel_chat() {
    let server = TestServer::start().await;
    let client = server.client().await;

    client
        .call(
            "hooks.register",
            Some(json!({"event": "before:llm:request", "patch": {"cancel": true}})),
        )
        .await
        .unwrap();

    let reply = client
        .call("chat.sendMessage", Some(json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(reply["cancelled"], true);
    assert_eq!(reply["response"], Value::Null);

    let messages = client.call("chat.getMessageList", None).await.unwrap();
    assert_eq!(messages["messages"], json!([]));
}

#[tokio::test]
async fn test_ws_event_subscription() {
    let server = TestServer::start().await;
    let client = server.client().await;
    let mut notifications = client.notifications();

    let subscription = client
        .call("events.subscribe", Some(json!({"events": ["chat.message"]})))
        .await
        .unwrap();
    let subscription_id = subscription["subscriptionId"].as_str().unwrap().to_string();

    client
        .call("chat.sendMessage", Some(json!({"message": "hi"})))
        .await
        .unwrap();

    let pushed = tokio::time::timeout(WAIT, notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pushed.method, EVENT_NOTIFICATION);
    let params = pushed.params.unwrap();
    assert_eq!(params["subscriptionId"], subscription_id.as_str());
    assert_eq!(params["event"], "chat.message");
    assert_eq!(params["data"]["response"], "You said: hi");

    let listed = client.call("events.listSubscriptions", None).await.unwrap();
    assert_eq!(listed["subscriptions"].as_array().unwrap().len(), 1);

    let removed = client
        .call(
            "events.unsubscribe",
            Some(json!({"subscriptionId": subscription_id})),
        )
        .await
        .unwrap();
    assert_eq!(removed["removed"], true);
}

#[tokio::test]
async fn test_ws_timeout_leaves_no_pending_calls() {
    let mut collaborators = Collaborators::in_memory(None).unwrap();
    collaborators.chat = Arc::new(SlowChat {
        inner: EchoChatBackend::new(),
        delay: Duration::from_millis(500),
    });
    let server = TestServer::start_with(collaborators).await;
    let client = server.client().await;

    let err = client
        .call_with_timeout(
            "chat.sendMessage",
            Some(json!({"message": "hi"})),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout { timeout_ms: 50, .. }));
    assert_eq!(client.pending_count(), 0);

    // The late reply is dropped and the connection stays usable.
    let reply = client
        .call("chat.sendMessage", Some(json!({"message": "again"})))
        .await
        .unwrap();
    assert_eq!(reply["response"], "You said: again");
    assert_eq!(client.pending_count(), 0);
}
