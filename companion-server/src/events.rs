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

//! Server-side events
//!
//! Handlers publish `{event, data}` records on one [`EventBus`]. Each duplex
//! connection owns a [`SubscriptionSet`]; every subscription forwards the
//! matching records to that connection as `events.emitted` notifications.

use companion_protocol::params::events::{
    EventEmitted, SubscriptionInfo, EVENT_NOTIFICATION, WILDCARD,
};
use companion_protocol::{encode, JsonRpcNotification};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Event names published by the router.
pub mod names {
    pub const CHAT_MESSAGE: &str = "chat.message";
    pub const CHAT_STREAM: &str = "chat.stream";
    pub const CHAT_INTERRUPTED: &str = "chat.interrupted";
    pub const CHARACTER_EXPRESSION: &str = "character.expression";
    pub const CONFIG_CHANGED: &str = "config.changed";
    pub const SCENARIO_LOADED: &str = "scenario.loaded";
    pub const SCENARIO_UNLOADED: &str = "scenario.unloaded";
    pub const HOOKS_TRIGGERED: &str = "hooks.triggered";
    pub const XR_SESSION: &str = "xr.session";
}

const DEFAULT_CAPACITY: usize = 256;

/// One published event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event: String,
    pub data: Value,
}

/// Fan-out channel for server events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventRecord>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    /// Publish an event; returns how many receivers saw it.
    pub fn publish(&self, event: &str, data: impl Serialize) -> usize {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping event {}: {}", event, e);
                return 0;
            }
        };
        // No receivers is not an error
        self.tx
            .send(EventRecord {
                event: event.to_string(),
                data,
            })
            .unwrap_or(0)
    }
}

fn matches(filter: &[String], event: &str) -> bool {
    filter.iter().any(|f| f == WILDCARD || f == event)
}

struct Subscription {
    events: Vec<String>,
    cancel: CancellationToken,
}

/// Subscriptions of one connection.
///
/// Dropping the set stops every forwarder task.
pub struct SubscriptionSet {
    outbound: mpsc::UnboundedSender<String>,
    subscriptions: DashMap<String, Subscription>,
}

impl SubscriptionSet {
    /// `outbound` receives encoded notifications for the connection writer.
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            subscriptions: DashMap::new(),
        }
    }

    pub fn subscribe(&self, bus: &EventBus, events: Vec<String>) -> SubscriptionInfo {
        let subscription_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        // Receiver is created before returning so nothing published after
        // the reply is missed.
        let rx = bus.subscribe();
        tokio::spawn(forward(
            subscription_id.clone(),
            events.clone(),
            rx,
            self.outbound.clone(),
            cancel.clone(),
        ));

        self.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                events: events.clone(),
                cancel,
            },
        );
        debug!("Subscription {} created for {:?}", subscription_id, events);

        SubscriptionInfo {
            subscription_id,
            events,
        }
    }

    pub fn unsubscribe(&self, subscription_id: &str) -> bool {
        match self.subscriptions.remove(subscription_id) {
            Some((_, subscription)) => {
                subscription.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<SubscriptionInfo> {
        let mut list: Vec<_> = self
            .subscriptions
            .iter()
            .map(|entry| SubscriptionInfo {
                subscription_id: entry.key().clone(),
                events: entry.value().events.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.subscription_id.cmp(&b.subscription_id));
        list
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn close_all(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().cancel.cancel();
        }
        self.subscriptions.clear();
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.close_all();
    }
}

async fn forward(
    subscription_id: String,
    filter: Vec<String>,
    mut rx: broadcast::Receiver<EventRecord>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            record = rx.recv() => match record {
                Ok(record) if matches(&filter, &record.event) => {
                    let params = EventEmitted {
                        subscription_id: subscription_id.clone(),
                        event: record.event,
                        data: record.data,
                    };
                    let notification = JsonRpcNotification::new(
                        EVENT_NOTIFICATION,
                        serde_json::to_value(params).ok(),
                    );
                    if outbound.send(encode(&notification)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Subscription {} lagged (skipped {} events)",
                        subscription_id, skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("Subscription {} closed", subscription_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_matching_events_only() {
        let bus = EventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let set = SubscriptionSet::new(tx);

        let info = set.subscribe(&bus, vec![names::CHAT_MESSAGE.to_string()]);
        bus.publish(names::CONFIG_CHANGED, json!({"key": "voice"}));
        bus.publish(names::CHAT_MESSAGE, json!({"message": "hi"}));

        let msg = next_event(&mut rx).await;
        assert_eq!(msg["method"], EVENT_NOTIFICATION);
        assert_eq!(msg["params"]["subscriptionId"], info.subscription_id.as_str());
        assert_eq!(msg["params"]["event"], names::CHAT_MESSAGE);
        assert_eq!(msg["params"]["data"]["message"], "hi");
        assert!(msg.get("id").is_none());
    }

    #[tokio::test]
    async fn test_wildcard_and_unsubscribe() {
        let bus = EventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let set = SubscriptionSet::new(tx);

        let info = set.subscribe(&bus, vec![WILDCARD.to_string()]);
        assert_eq!(set.list().len(), 1);

        bus.publish(names::XR_SESSION, json!({"active": true}));
        assert_eq!(next_event(&mut rx).await["params"]["event"], names::XR_SESSION);

        assert!(set.unsubscribe(&info.subscription_id));
        assert!(!set.unsubscribe(&info.subscription_id));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_drop_stops_forwarders() {
        let bus = EventBus::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let set = SubscriptionSet::new(tx);
        set.subscribe(&bus, vec![WILDCARD.to_string()]);
        assert_eq!(bus.tx.receiver_count(), 1);

        drop(set);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bus.tx.receiver_count(), 0);
    }
}
