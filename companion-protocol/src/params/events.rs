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

//! `events.*` params and results, plus the pushed notification shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_non_empty, Validate};

/// Method name of server-pushed event notifications.
pub const EVENT_NOTIFICATION: &str = "events.emitted";

/// Subscribes to every event.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub events: Vec<String>,
}

impl Validate for SubscribeParams {
    fn validate(&self) -> Result<(), String> {
        if self.events.is_empty() {
            return Err("events cannot be empty".into());
        }
        self.events.iter().try_for_each(|e| check_non_empty("event", e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeParams {
    pub subscription_id: String,
}

impl Validate for UnsubscribeParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionList {
    pub subscriptions: Vec<SubscriptionInfo>,
}

/// Params of an `events.emitted` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEmitted {
    pub subscription_id: String,
    pub event: String,
    pub data: Value,
}
