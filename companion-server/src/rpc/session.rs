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

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::SubscriptionSet;

/// Per-connection context handed to every call.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    kind: SessionKind,
}

#[derive(Clone)]
enum SessionKind {
    /// WebSocket: can receive pushed notifications.
    Duplex {
        subscriptions: Arc<SubscriptionSet>,
    },
    /// One HTTP request, one response.
    SingleShot,
}

impl Session {
    /// A duplex session; `outbound` is the connection's writer queue.
    pub fn duplex(id: impl Into<String>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: id.into(),
            kind: SessionKind::Duplex {
                subscriptions: Arc::new(SubscriptionSet::new(outbound)),
            },
        }
    }

    pub fn single_shot() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: SessionKind::SingleShot,
        }
    }

    /// Subscriptions, when this session can receive pushes.
    pub fn subscriptions(&self) -> Option<&Arc<SubscriptionSet>> {
        match &self.kind {
            SessionKind::Duplex { subscriptions } => Some(subscriptions),
            SessionKind::SingleShot => None,
        }
    }

    /// Drop every subscription of this session.
    pub fn close(&self) {
        if let Some(subscriptions) = self.subscriptions() {
            subscriptions.close_all();
        }
    }
}
