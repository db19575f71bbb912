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

//! Connection loop
//!
//! ```text
//! Disconnected ──spawn──► Connecting ──ok──► Connected
//!                             ▲                  │ lost
//!                             │ delay            ▼
//!                             └────────── Reconnecting { attempt }
//! ```
//!
//! Losing the connection rejects every pending call at once; the loop then
//! waits out the policy delay and dials again until the policy gives up or
//! the client shuts down.

use companion_protocol::{JsonRpcNotification, JsonRpcResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::pending::PendingCalls;
use crate::transport::{Connection, Connector};

const NOTIFICATION_CAPACITY: usize = 256;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_delay: Duration },
}

/// Reconnection policy. The default retries every 5 seconds forever.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
            backoff: Backoff::Fixed,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn exponential(initial: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            delay: initial,
            max_attempts: None,
            backoff: Backoff::Exponential { factor, max_delay },
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.delay.as_secs_f64() * factor.powi(exponent);
                if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
                    max_delay
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                }
            }
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
}

/// State shared by the client handle and the loop task.
pub(crate) struct Shared {
    pub outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pub pending: PendingCalls,
    pub notifications: broadcast::Sender<JsonRpcNotification>,
    pub state: watch::Sender<ConnectionState>,
}

impl Shared {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            outbound: Mutex::new(None),
            pending: PendingCalls::default(),
            notifications,
            state,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Route one inbound frame: responses to their caller, notifications
    /// to subscribers.
    pub fn dispatch(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Dropping unparseable frame: {}", e);
                return;
            }
        };

        match value {
            Value::Array(items) => items.into_iter().for_each(|item| self.dispatch_value(item)),
            value => self.dispatch_value(value),
        }
    }

    fn dispatch_value(&self, value: Value) {
        let is_call = value.get("method").is_some();
        let has_id = value.get("id").is_some();

        if is_call && has_id {
            debug!("Ignoring server-initiated request");
        } else if is_call {
            match serde_json::from_value::<JsonRpcNotification>(value) {
                Ok(notification) => {
                    // No subscribers is fine.
                    let _ = self.notifications.send(notification);
                }
                Err(e) => warn!("Malformed notification: {}", e),
            }
        } else if has_id {
            match serde_json::from_value::<JsonRpcResponse>(value) {
                Ok(response) => {
                    self.pending.complete(response);
                }
                Err(e) => warn!("Malformed response: {}", e),
            }
        } else {
            debug!("Dropping envelope with neither method nor id");
        }
    }
}

/// Dial, serve, and redial until shut down or the policy gives up.
pub(crate) async fn run_connection_loop(
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = connector.connect() => result,
        };

        match connected {
            Ok(Connection {
                outbound,
                mut inbound,
            }) => {
                info!("Connected");
                attempt = 0;
                *shared.outbound.lock() = Some(outbound);
                shared.set_state(ConnectionState::Connected);

                let shutdown_requested = run_message_loop(&shared, &mut inbound, &shutdown).await;

                // Sender first, then pending calls.
                shared.outbound.lock().take();
                if shutdown_requested {
                    break;
                }

                let rejected = shared.pending.fail_all(|| ClientError::ConnectionLost);
                warn!("Connection lost, rejected {} pending calls", rejected);
            }
            Err(e) => warn!("Failed to connect: {}", e),
        }

        attempt += 1;
        if policy.exhausted(attempt) {
            warn!("Giving up after {} reconnect attempts", attempt - 1);
            break;
        }

        let delay = policy.delay_for(attempt);
        shared.set_state(ConnectionState::Reconnecting { attempt });
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.outbound.lock().take();
    shared.pending.fail_all(|| ClientError::Shutdown);
    shared.set_state(ConnectionState::Disconnected);
    info!("Connection loop stopped");
}

/// Returns true when shutdown was requested, false when the connection ended.
async fn run_message_loop(
    shared: &Shared,
    inbound: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return true,
            frame = inbound.recv() => match frame {
                Some(text) => shared.dispatch(&text),
                None => return false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_policy_retries_every_five_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(50), Duration::from_secs(5));
        assert!(!policy.exhausted(u32::MAX));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = ReconnectPolicy::exponential(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(1000),
        )
        .with_max_attempts(3);

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(1000));

        assert!(!policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[tokio::test]
    async fn test_dispatch_routes_responses_and_notifications() {
        let shared = Shared::new();
        let mut notifications = shared.notifications.subscribe();
        let reply = shared.pending.insert(3);

        shared.dispatch(
            &json!([
                {"jsonrpc": "2.0", "result": {"pong": true}, "id": 3},
                {"jsonrpc": "2.0", "method": "events.emitted", "params": {"event": "chat.message"}}
            ])
            .to_string(),
        );
        shared.dispatch("not json");

        assert_eq!(reply.await.unwrap().unwrap(), json!({"pong": true}));
        let notification = notifications.recv().await.unwrap();
        assert_eq!(notification.method, "events.emitted");
        assert_eq!(shared.pending.len(), 0);
    }
}
