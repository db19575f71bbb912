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

use companion_protocol::{encode, JsonRpcNotification, JsonRpcRequest};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{run_connection_loop, ConnectionState, ReconnectPolicy, Shared};
use crate::error::{ClientError, Result};
use crate::pending::PendingCalls;
use crate::transport::{Connector, WsConnector};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:47200/rpc/ws`
    pub url: String,
    /// Default per-call deadline
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// JSON-RPC client with request correlation and automatic reconnection.
///
/// Ids are strictly increasing for the lifetime of the client, across
/// reconnects. Dropping the client stops the connection loop.
pub struct RpcClient {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcClient {
    /// Connect over WebSocket and wait for the first connection.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let wait = config.request_timeout;
        let connector = Arc::new(WsConnector::new(config.url.clone()));
        let client = Self::with_connector(config, connector);
        client.wait_connected(wait).await?;
        Ok(client)
    }

    /// Start the connection loop over any connector. Returns immediately;
    /// use [`RpcClient::wait_connected`] before the first call.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let shared = Arc::new(Shared::new());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_connection_loop(
            connector,
            config.reconnect,
            shared.clone(),
            shutdown.clone(),
        ));

        Self {
            shared,
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_with_timeout(method, params, self.request_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Shutdown);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Registered before the sender is read; the loop clears the sender
        // before rejecting the table.
        let reply = self.shared.pending.insert(id);
        let _entry = PendingEntry {
            pending: &self.shared.pending,
            id,
        };

        let Some(outbound) = self.shared.outbound.lock().clone() else {
            return Err(ClientError::NotConnected);
        };

        let request = JsonRpcRequest::new(id as i64, method, params);
        if outbound.send(encode(&request)).is_err() {
            return Err(ClientError::ConnectionLost);
        }
        debug!("Sent {} (id {})", method, id);

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionLost),
            Err(_) => {
                warn!("{} (id {}) timed out after {:?}", method, id, timeout);
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Call with typed params and result.
    pub async fn call_typed<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let result = self.call(method, Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Fire-and-forget; no response is expected or tracked.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let outbound = self
            .shared
            .outbound
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;

        outbound
            .send(encode(&JsonRpcNotification::new(method, params)))
            .map_err(|_| ClientError::ConnectionLost)
    }

    /// Server-pushed notifications, from now on.
    pub fn notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.shared.notifications.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until connected, at most `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut states = self.state_changes();
        let outcome = tokio::time::timeout(
            timeout,
            states.wait_for(|state| *state == ConnectionState::Connected),
        )
        .await
        .map(|connected| connected.map(|_| ()));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ClientError::Shutdown),
            Err(_) => Err(ClientError::NotConnected),
        }
    }

    /// Calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Stop the connection loop and reject every pending call.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Connection loop ended abnormally: {}", e);
            }
        }
    }
}

/// Removes a call's pending entry however the call ends, including when
/// the caller drops the future mid-wait.
struct PendingEntry<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelConnector, Connection};
    use companion_protocol::{JsonRpcId, JsonRpcResponse};
    use serde_json::json;
    use std::sync::atomic::Ordering as AtomicOrdering;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    const WAIT: Duration = Duration::from_secs(2);

    fn fast_config() -> ClientConfig {
        ClientConfig::new("memory://")
            .with_request_timeout(WAIT)
            .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(20)))
    }

    async fn start() -> (RpcClient, Arc<std::sync::atomic::AtomicBool>, mpsc::UnboundedReceiver<Connection>) {
        let (connector, accepted) = ChannelConnector::new();
        let availability = connector.availability();
        let client = RpcClient::with_connector(fast_config(), Arc::new(connector));
        assert_ok!(client.wait_connected(WAIT).await);
        (client, availability, accepted)
    }

    async fn next_request(peer: &mut Connection) -> JsonRpcRequest {
        let text = peer.inbound.recv().await.unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_call_is_correlated_by_id() {
        let (client, _availability, mut accepted) = start().await;
        let mut peer = accepted.recv().await.unwrap();

        let server = tokio::spawn(async move {
            let first = next_request(&mut peer).await;
            let second = next_request(&mut peer).await;
            // Answer out of order.
            for request in [second, first] {
                let response =
                    JsonRpcResponse::success(request.id.clone(), json!({"echo": request.method}));
                peer.outbound.send(encode(&response)).unwrap();
            }
            peer
        });

        let (a, b) = tokio::join!(
            client.call("system.ping", None),
            client.call("system.version", None)
        );
        assert_eq!(a.unwrap(), json!({"echo": "system.ping"}));
        assert_eq!(b.unwrap(), json!({"echo": "system.version"}));
        assert_eq!(client.pending_count(), 0);

        let _peer = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_error_is_rejected_with_code() {
        let (client, _availability, mut accepted) = start().await;
        let mut peer = accepted.recv().await.unwrap();

        tokio::spawn(async move {
            let request = next_request(&mut peer).await;
            let error = companion_protocol::JsonRpcError::method_not_found(&request.method);
            peer.outbound
                .send(encode(&JsonRpcResponse::error(request.id, error)))
                .unwrap();
            peer
        });

        let err = assert_err!(client.call("nope.nope", None).await);
        assert_eq!(err.code(), Some(-32601));
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_entry() {
        let (client, _availability, mut accepted) = start().await;
        let _silent = accepted.recv().await.unwrap();

        let started = std::time::Instant::now();
        let err = client
            .call_with_timeout(
                "chat.sendMessage",
                Some(json!({"message": "hi"})),
                Duration::from_millis(10),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout { timeout_ms: 10, .. }));
        assert!(started.elapsed() < WAIT);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_call_clears_pending_entry() {
        let (client, _availability, mut accepted) = start().await;
        let mut silent = accepted.recv().await.unwrap();

        tokio::select! {
            _ = client.call("chat.sendMessage", Some(json!({"message": "hi"}))) => {
                panic!("a silent peer never answers")
            }
            _ = silent.inbound.recv() => {}
        }
        assert_eq!(client.pending_count(), 0);

        // A late reply for the abandoned id is dropped.
        let late = JsonRpcResponse::success(JsonRpcId::Number(1), json!("late"));
        silent.outbound.send(encode(&late)).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_loss_rejects_pending_and_reconnects() {
        let (client, _availability, mut accepted) = start().await;
        let mut peer = accepted.recv().await.unwrap();

        let dropper = tokio::spawn(async move {
            let request = next_request(&mut peer).await;
            drop(peer);
            request.id
        });

        let err = client.call("chat.sendMessage", None).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionLost));
        assert_eq!(dropper.await.unwrap(), JsonRpcId::Number(1));
        assert_eq!(client.pending_count(), 0);

        // The loop dials again and ids keep counting.
        let mut peer = accepted.recv().await.unwrap();
        assert_ok!(client.wait_connected(WAIT).await);

        tokio::spawn(async move {
            let request = next_request(&mut peer).await;
            let response = JsonRpcResponse::success(request.id.clone(), json!(request.id));
            peer.outbound.send(encode(&response)).unwrap();
            peer
        });
        assert_eq!(client.call("system.ping", None).await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_calls_fail_fast_while_disconnected() {
        let (client, availability, mut accepted) = start().await;
        availability.store(false, AtomicOrdering::SeqCst);

        let peer = accepted.recv().await.unwrap();
        let mut states = client.state_changes();
        drop(peer);
        assert_ok!(
            states
                .wait_for(|state| matches!(state, ConnectionState::Reconnecting { .. }))
                .await
        );

        assert!(matches!(
            client.call("system.ping", None).await,
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.notify("chat.interrupt", None),
            Err(ClientError::NotConnected)
        ));

        availability.store(true, AtomicOrdering::SeqCst);
        assert_ok!(client.wait_connected(WAIT).await);
    }

    #[tokio::test]
    async fn test_notifications_are_delivered_without_pending_entries() {
        let (client, _availability, mut accepted) = start().await;
        let mut peer = accepted.recv().await.unwrap();
        let mut notifications = client.notifications();

        client
            .notify("chat.interrupt", Some(json!({})))
            .unwrap();
        assert_eq!(client.pending_count(), 0);
        let sent: Value = serde_json::from_str(&peer.inbound.recv().await.unwrap()).unwrap();
        assert!(sent.get("id").is_none());

        let pushed = JsonRpcNotification::new(
            "events.emitted",
            Some(json!({"subscriptionId": "s1", "event": "chat.message", "data": {}})),
        );
        peer.outbound.send(encode(&pushed)).unwrap();

        let received = notifications.recv().await.unwrap();
        assert_eq!(received, pushed);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_pending_calls() {
        let (client, _availability, mut accepted) = start().await;
        let _silent = accepted.recv().await.unwrap();
        let client = Arc::new(client);

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("chat.sendMessage", None).await })
        };
        while client.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        client.shutdown().await;
        assert!(matches!(
            caller.await.unwrap(),
            Err(ClientError::Shutdown)
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(
            client.call("system.ping", None).await,
            Err(ClientError::Shutdown)
        ));
    }
}
