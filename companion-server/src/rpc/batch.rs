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

//! `system.batch`: several actions in one call.
//!
//! Responses come back in submission order whether the actions ran one after
//! another or all at once. One failing action never aborts the others.

use companion_protocol::params::system::{BatchAction, BatchParams, BatchResult};
use companion_protocol::{JsonRpcId, JsonRpcResponse, Method, MethodCall, RpcError};
use futures::future::join_all;
use tracing::debug;

use super::handlers::{CallResult, RpcHandler};
use super::namespaces::respond;
use super::session::Session;

pub(crate) async fn run(handler: &RpcHandler, params: BatchParams, session: &Session) -> CallResult {
    let limit = handler.max_batch_size();
    if params.actions.len() > limit {
        return Err(RpcError::invalid_params(
            Method::SystemBatch.as_str(),
            format!("{} actions exceed the limit of {}", params.actions.len(), limit),
        ));
    }

    debug!(
        actions = params.actions.len(),
        sequential = params.sequential,
        "Running batch"
    );

    let actions = params.actions.into_iter().enumerate();
    let results = if params.sequential {
        let mut results = Vec::new();
        for (index, action) in actions {
            results.push(run_action(handler, index, action, session).await);
        }
        results
    } else {
        join_all(actions.map(|(index, action)| run_action(handler, index, action, session))).await
    };

    respond(BatchResult { results })
}

async fn run_action(
    handler: &RpcHandler,
    index: usize,
    action: BatchAction,
    session: &Session,
) -> JsonRpcResponse {
    let id = action.id.unwrap_or(JsonRpcId::Number(index as i64));

    let outcome = match MethodCall::parse(&action.method, action.params) {
        Ok(MethodCall::SystemBatch(_)) => Err(RpcError::invalid_params(
            Method::SystemBatch.as_str(),
            "system.batch cannot be nested",
        )),
        Ok(call) => handler.guarded(call, session).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, e.into()),
    }
}
