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

//! `config.*` and `scenario.*`.

use companion_hooks::points;
use companion_protocol::params::config::{
    ConfigKeyParams, ConfigSnapshot, ConfigValueResult, LoadScenarioParams, SetConfigParams,
    UpdateConfigParams,
};
use companion_protocol::{AckResult, Namespace};
use serde_json::{json, Value};
use tracing::info;

use super::{respond, string_field};
use crate::events::names;
use crate::rpc::handlers::{CallResult, RpcHandler};

pub(crate) async fn get(h: &RpcHandler, params: ConfigKeyParams) -> CallResult {
    let value = h
        .collaborators
        .config
        .get(&params.key)
        .await
        .map_err(|e| e.into_rpc(Namespace::Config))?;
    respond(ConfigValueResult {
        key: params.key,
        value: value.unwrap_or(Value::Null),
    })
}

pub(crate) async fn set(h: &RpcHandler, params: SetConfigParams) -> CallResult {
    h.collaborators
        .config
        .set(&params.key, params.value.clone())
        .await
        .map_err(|e| e.into_rpc(Namespace::Config))?;
    h.events.publish(
        names::CONFIG_CHANGED,
        json!({ "key": params.key, "value": params.value }),
    );
    respond(AckResult::ok())
}

pub(crate) async fn get_all(h: &RpcHandler) -> CallResult {
    let config = h
        .collaborators
        .config
        .all()
        .await
        .map_err(|e| e.into_rpc(Namespace::Config))?;
    respond(ConfigSnapshot { config })
}

pub(crate) async fn update(h: &RpcHandler, params: UpdateConfigParams) -> CallResult {
    h.collaborators
        .config
        .update(params.values.clone())
        .await
        .map_err(|e| e.into_rpc(Namespace::Config))?;
    for (key, value) in params.values {
        h.events
            .publish(names::CONFIG_CHANGED, json!({ "key": key, "value": value }));
    }
    respond(AckResult::ok())
}

/// `scenario:load` hooks may rename the scenario or adjust its options.
pub(crate) async fn load_scenario(h: &RpcHandler, params: LoadScenarioParams) -> CallResult {
    let context = h
        .hooks
        .trigger(
            points::SCENARIO_LOAD,
            json!({ "name": &params.name, "options": &params.options }),
        )
        .await;
    let name = string_field(&context, "name").unwrap_or(params.name);
    let options = context.get("options").cloned().unwrap_or(params.options);

    let state = h
        .collaborators
        .scenario
        .load(&name, options)
        .await
        .map_err(|e| e.into_rpc(Namespace::Scenario))?;

    info!(scenario = %name, "Scenario loaded");
    h.events.publish(
        names::SCENARIO_LOADED,
        json!({ "name": name, "options": &state.options }),
    );
    respond(state)
}

pub(crate) async fn unload_scenario(h: &RpcHandler) -> CallResult {
    let name = h
        .collaborators
        .scenario
        .unload()
        .await
        .map_err(|e| e.into_rpc(Namespace::Scenario))?;
    info!(scenario = %name, "Scenario unloaded");
    h.events
        .publish(names::SCENARIO_UNLOADED, json!({ "name": name }));
    respond(AckResult::ok())
}

pub(crate) async fn scenario_state(h: &RpcHandler) -> CallResult {
    let state = h
        .collaborators
        .scenario
        .state()
        .await
        .map_err(|e| e.into_rpc(Namespace::Scenario))?;
    respond(state)
}
