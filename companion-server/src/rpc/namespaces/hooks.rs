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

//! `hooks.*`: remote administration of the hook pipeline.

use companion_hooks::{HookDefinition, HookDispatcher, PatchHandler, PatchObserver, RegistryError};
use companion_protocol::params::hooks::{
    EventParams, GetMetricsParams, HookIdParams, HooksStateResult, ListHooksParams,
    ListHooksResult, MetricsResult, RegisterHookResult, RemovedCountResult, RemovedResult,
    ToggleHooksParams, TriggerParams, TriggerResult,
};
use companion_protocol::{AckResult, RpcError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::respond;
use crate::events::{names, EventBus};
use crate::rpc::handlers::{CallResult, RpcHandler};

/// Install a declarative hook: its patch is merged into the context and
/// every run publishes `hooks.triggered`.
pub(crate) fn install(
    hooks: &HookDispatcher,
    events: &EventBus,
    definition: &HookDefinition,
) -> Result<String, RegistryError> {
    let hook_id = uuid::Uuid::new_v4().to_string();

    let events = events.clone();
    let observed_id = hook_id.clone();
    let event = definition.event.clone();
    let observer: PatchObserver = Arc::new(move |_: &Value| {
        events.publish(
            names::HOOKS_TRIGGERED,
            json!({ "hookId": observed_id, "event": event }),
        );
    });

    let handler = PatchHandler::new(definition.display_name(), definition.patch.clone())
        .with_observer(observer);
    hooks.register(
        &definition.event,
        handler,
        definition.options().with_id(hook_id),
    )
}

pub(crate) fn register(h: &RpcHandler, definition: HookDefinition) -> CallResult {
    let hook_id = install(&h.hooks, &h.events, &definition)?;
    info!(hook_id = %hook_id, event = %definition.event, "Hook registered");
    respond(RegisterHookResult { hook_id })
}

pub(crate) fn unregister(h: &RpcHandler, params: HookIdParams) -> CallResult {
    if !h.hooks.unregister(&params.hook_id) {
        return Err(RpcError::HookNotFound(params.hook_id));
    }
    info!(hook_id = %params.hook_id, "Hook unregistered");
    respond(RemovedResult { removed: true })
}

pub(crate) fn unregister_all(h: &RpcHandler, params: EventParams) -> CallResult {
    let removed = h.hooks.unregister_all(&params.event);
    info!(event = %params.event, removed, "Hooks unregistered");
    respond(RemovedCountResult { removed })
}

pub(crate) async fn trigger(h: &RpcHandler, params: TriggerParams) -> CallResult {
    let outcome = h.hooks.trigger_detailed(&params.event, params.context).await;
    let executed = outcome.invoked();
    let failed = outcome.failures();
    respond(TriggerResult {
        context: outcome.context,
        executed,
        failed,
    })
}

pub(crate) fn list(h: &RpcHandler, params: ListHooksParams) -> CallResult {
    respond(ListHooksResult {
        hooks: h.hooks.list(params.event.as_deref()),
    })
}

pub(crate) fn metrics(h: &RpcHandler, params: GetMetricsParams) -> CallResult {
    let metrics = h
        .hooks
        .get_metrics(params.hook_id.as_deref(), params.event.as_deref());

    match params.hook_id {
        Some(hook_id) if metrics.is_empty() => Err(RpcError::HookNotFound(hook_id)),
        _ => respond(MetricsResult { metrics }),
    }
}

/// Toggle the whole pipeline, or a single hook when `hookId` is given.
pub(crate) fn toggle(h: &RpcHandler, params: ToggleHooksParams, enabled: bool) -> CallResult {
    match params.hook_id {
        Some(hook_id) => h.hooks.set_hook_enabled(&hook_id, enabled)?,
        None => h.hooks.set_enabled(enabled),
    }
    respond(HooksStateResult {
        enabled: h.hooks.is_enabled(),
        hook_count: h.hooks.hook_count(),
    })
}

pub(crate) fn clear(h: &RpcHandler) -> CallResult {
    h.hooks.clear();
    info!("All hooks cleared");
    respond(AckResult::ok())
}
