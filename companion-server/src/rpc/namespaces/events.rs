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

//! `events.*`: per-connection subscriptions.

use companion_protocol::params::events::{
    SubscribeParams, SubscriptionList, UnsubscribeParams,
};
use companion_protocol::params::hooks::RemovedResult;
use companion_protocol::RpcError;
use std::sync::Arc;

use super::respond;
use crate::events::SubscriptionSet;
use crate::rpc::handlers::{CallResult, RpcHandler};
use crate::rpc::session::Session;

fn subscriptions(session: &Session) -> Result<&Arc<SubscriptionSet>, RpcError> {
    session.subscriptions().ok_or_else(|| {
        RpcError::StateUnavailable("event subscriptions need a WebSocket connection".into())
    })
}

pub(crate) fn subscribe(h: &RpcHandler, params: SubscribeParams, session: &Session) -> CallResult {
    let info = subscriptions(session)?.subscribe(&h.events, params.events);
    respond(info)
}

pub(crate) fn unsubscribe(params: UnsubscribeParams, session: &Session) -> CallResult {
    let removed = subscriptions(session)?.unsubscribe(&params.subscription_id);
    respond(RemovedResult { removed })
}

pub(crate) fn list(session: &Session) -> CallResult {
    respond(SubscriptionList {
        subscriptions: subscriptions(session)?.list(),
    })
}
