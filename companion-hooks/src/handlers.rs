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

//! Hook handler traits and implementations.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during hook execution.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    #[error("Hook execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Hook timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Hook panicked: {0}")]
    Panicked(String),

    #[error("Hook cancelled")]
    Cancelled,

    #[error("Hook configuration error: {0}")]
    ConfigError(String),
}

/// Trait for asynchronous hook handlers.
///
/// A handler receives the current pipeline context and returns the context
/// the next hook should see. The cancellation token fires when the pipeline
/// stops waiting (timeout); handlers that spawn work should watch it.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Transform the context.
    async fn handle(&self, context: Value, cancel: CancellationToken) -> Result<Value, HookError>;

    /// Get the handler name.
    fn name(&self) -> &str;
}

/// Type alias for a shared async hook handler.
pub type AsyncHookHandler = Arc<dyn HookHandler>;

/// Handler that returns the context untouched.
pub struct NoOpHandler {
    name: String,
}

impl NoOpHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl HookHandler for NoOpHandler {
    async fn handle(&self, context: Value, _cancel: CancellationToken) -> Result<Value, HookError> {
        Ok(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler wrapping a synchronous closure.
pub struct CallbackHandler<F>
where
    F: Fn(Value) -> Result<Value, HookError> + Send + Sync,
{
    name: String,
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(Value) -> Result<Value, HookError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

#[async_trait]
impl<F> HookHandler for CallbackHandler<F>
where
    F: Fn(Value) -> Result<Value, HookError> + Send + Sync + 'static,
{
    async fn handle(&self, context: Value, _cancel: CancellationToken) -> Result<Value, HookError> {
        (self.callback)(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler wrapping an async closure. The closure receives the cancellation
/// token so it can stop early when the pipeline gives up on it.
pub struct AsyncCallbackHandler<F> {
    name: String,
    callback: F,
}

impl<F, Fut> AsyncCallbackHandler<F>
where
    F: Fn(Value, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HookError>> + Send,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

#[async_trait]
impl<F, Fut> HookHandler for AsyncCallbackHandler<F>
where
    F: Fn(Value, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
{
    async fn handle(&self, context: Value, cancel: CancellationToken) -> Result<Value, HookError> {
        (self.callback)(context, cancel).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Callback invoked with the patched context after a [`PatchHandler`] fires.
pub type PatchObserver = Arc<dyn Fn(&Value) + Send + Sync>;

/// Declarative handler: shallow-merges a fixed object into the context.
///
/// This is what remote callers get, since they cannot ship code.
pub struct PatchHandler {
    name: String,
    patch: Map<String, Value>,
    observer: Option<PatchObserver>,
}

impl PatchHandler {
    pub fn new(name: impl Into<String>, patch: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            patch,
            observer: None,
        }
    }

    /// Run `observer` after each successful merge.
    pub fn with_observer(mut self, observer: PatchObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Merge the patch into `context`. A null context becomes the patch itself.
    pub fn apply(&self, context: Value) -> Result<Value, HookError> {
        let mut obj = match context {
            Value::Object(obj) => obj,
            Value::Null => Map::new(),
            other => {
                return Err(HookError::ExecutionFailed(format!(
                    "cannot patch a non-object context: {}",
                    other
                )))
            }
        };
        for (key, value) in &self.patch {
            obj.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(obj))
    }
}

#[async_trait]
impl HookHandler for PatchHandler {
    async fn handle(&self, context: Value, _cancel: CancellationToken) -> Result<Value, HookError> {
        let patched = self.apply(context)?;
        if let Some(observer) = &self.observer {
            observer(&patched);
        }
        Ok(patched)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_patch_handler_merges_shallowly() {
        let patch = json!({"cancel": true, "user": {"name": "kai"}});
        let handler = PatchHandler::new("patch", patch.as_object().cloned().unwrap());

        let out = tokio_test::block_on(handler.handle(
            json!({"message": "hi", "user": {"id": 1}}),
            CancellationToken::new(),
        ))
        .unwrap();

        assert_eq!(out["message"], "hi");
        assert_eq!(out["cancel"], true);
        assert_eq!(out["user"], json!({"name": "kai"}));
    }

    #[test]
    fn test_patch_handler_rejects_scalar_context() {
        let handler = PatchHandler::new("patch", Map::new());
        let err = handler.apply(json!(5)).unwrap_err();
        assert!(matches!(err, HookError::ExecutionFailed(_)));
    }

    #[test]
    fn test_patch_observer_sees_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = PatchHandler::new("patch", Map::new()).with_observer(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tokio_test::block_on(handler.handle(json!({}), CancellationToken::new())).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_handler() {
        let handler = CallbackHandler::new("upper", |mut ctx: Value| {
            let text = ctx["text"].as_str().unwrap_or_default().to_uppercase();
            ctx["text"] = Value::String(text);
            Ok(ctx)
        });
        let out = tokio_test::block_on(handler.handle(json!({"text": "hey"}), CancellationToken::new()))
            .unwrap();
        assert_eq!(out["text"], "HEY");
        assert_eq!(handler.name(), "upper");
    }
}
