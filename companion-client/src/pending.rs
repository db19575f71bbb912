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

//! Pending request table: request id to the waiting caller.

use companion_protocol::{JsonRpcId, JsonRpcResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ClientError;

pub(crate) type Reply = Result<Value, ClientError>;

#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
}

impl PendingCalls {
    pub fn insert(&self, id: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().insert(id, tx);
        rx
    }

    pub fn remove(&self, id: u64) -> bool {
        self.calls.lock().remove(&id).is_some()
    }

    /// Resolve the caller waiting on `response.id`. Returns false when
    /// nobody is waiting (late reply after a timeout, or an unknown id).
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        let id = match response.id {
            JsonRpcId::Number(n) if n >= 0 => n as u64,
            ref other => {
                debug!("Dropping response with foreign id {}", other);
                return false;
            }
        };

        let Some(tx) = self.calls.lock().remove(&id) else {
            debug!("No pending receiver for response {}", id);
            return false;
        };

        let reply = response.into_result().map_err(ClientError::Rpc);
        if tx.send(reply).is_err() {
            debug!("Caller for response {} went away", id);
        }
        true
    }

    /// Reject every waiting caller.
    pub fn fail_all(&self, error: impl Fn() -> ClientError) -> usize {
        let drained: Vec<_> = self.calls.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_protocol::JsonRpcError;
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_resolves_matching_caller() {
        let pending = PendingCalls::default();
        let first = pending.insert(1);
        let second = pending.insert(2);

        assert!(pending.complete(JsonRpcResponse::success(2i64.into(), json!("two"))));
        assert_eq!(second.await.unwrap().unwrap(), json!("two"));
        assert_eq!(pending.len(), 1);

        let error = JsonRpcError::method_not_found("nope.nope");
        assert!(pending.complete(JsonRpcResponse::error(1i64.into(), error)));
        let err = first.await.unwrap().unwrap_err();
        assert_eq!(err.code(), Some(-32601));
    }

    #[test]
    fn test_late_and_foreign_responses_are_dropped() {
        let pending = PendingCalls::default();
        let _rx = pending.insert(7);
        assert!(pending.remove(7));

        assert!(!pending.complete(JsonRpcResponse::success(7i64.into(), json!(null))));
        assert!(!pending.complete(JsonRpcResponse::success("abc".into(), json!(null))));
    }

    #[tokio::test]
    async fn test_fail_all_drains_table() {
        let pending = PendingCalls::default();
        let a = pending.insert(1);
        let b = pending.insert(2);

        assert_eq!(pending.fail_all(|| ClientError::ConnectionLost), 2);
        assert_eq!(pending.len(), 0);
        assert!(matches!(a.await.unwrap(), Err(ClientError::ConnectionLost)));
        assert!(matches!(b.await.unwrap(), Err(ClientError::ConnectionLost)));
    }
}
