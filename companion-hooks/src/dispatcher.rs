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

//! Hook dispatcher: runs the pipeline for an event and owns administration.

use crate::condition::Condition;
use crate::handlers::{AsyncHookHandler, HookError, HookHandler};
use crate::metrics::{HookMetrics, MetricsTable};
use crate::registry::{HookInfo, HookPriority, HookRegistry, RegisteredHook, RegistryError};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Options for [`HookDispatcher::register`].
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    /// Explicit id; a UUID is generated when absent.
    pub id: Option<String>,
    pub name: Option<String>,
    pub priority: HookPriority,
    pub condition: Option<Condition>,
    pub timeout: Option<Duration>,
    pub enabled: bool,
}

impl Default for RegisterOptions {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            priority: HookPriority::default(),
            condition: None,
            timeout: None,
            enabled: true,
        }
    }
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = HookPriority(priority);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(timeout_ms));
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// How a single hook fared during a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    Completed,
    /// Condition evaluated to false; not counted as a call.
    Skipped,
    Failed(String),
    TimedOut,
}

/// Result of executing a single hook.
#[derive(Debug, Clone)]
pub struct HookExecution {
    pub hook_id: String,
    pub status: ExecutionStatus,
    pub duration: Duration,
}

/// Result of triggering an event.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    /// Context after the last hook.
    pub context: Value,
    pub executions: Vec<HookExecution>,
}

impl TriggerOutcome {
    /// Hooks that were actually invoked (skips excluded).
    pub fn invoked(&self) -> usize {
        self.executions
            .iter()
            .filter(|e| e.status != ExecutionStatus::Skipped)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.executions
            .iter()
            .filter(|e| matches!(e.status, ExecutionStatus::Failed(_) | ExecutionStatus::TimedOut))
            .count()
    }
}

/// Dispatcher for executing hooks in response to pipeline events.
///
/// # Concurrency Model
///
/// The registry is a sharded-lock map (DashMap); a trigger takes a snapshot
/// of the event's hooks and runs them without holding any lock, so
/// administrative calls never wait on a slow handler. Within one trigger
/// hooks run strictly one after another. Metrics are atomic counters.
///
/// There is no global instance: construct one and share it by `Arc`.
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
    metrics: Arc<MetricsTable>,
    enabled: AtomicBool,
    default_timeout: Option<Duration>,
}

impl Default for HookDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(HookRegistry::new()))
    }
}

impl HookDispatcher {
    /// Create a new hook dispatcher.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(MetricsTable::new()),
            enabled: AtomicBool::new(true),
            default_timeout: None,
        }
    }

    /// Register a handler for `event`; returns the hook id.
    pub fn register(
        &self,
        event: &str,
        handler: impl HookHandler + 'static,
        options: RegisterOptions,
    ) -> Result<String, RegistryError> {
        self.register_arc(event, Arc::new(handler), options)
    }

    pub fn register_arc(
        &self,
        event: &str,
        handler: AsyncHookHandler,
        options: RegisterOptions,
    ) -> Result<String, RegistryError> {
        let id = options
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut hook = RegisteredHook::new(id, event, handler)
            .with_priority(options.priority)
            .with_enabled(options.enabled);
        // Metrics accumulate per id until `clear`, across re-registration.
        if let Some(counters) = self.metrics.counters(&hook.id) {
            hook = hook.with_counters(counters);
        }
        if let Some(name) = options.name {
            hook = hook.with_name(name);
        }
        if let Some(condition) = options.condition {
            hook = hook.with_condition(condition);
        }
        if let Some(timeout) = options.timeout.or(self.default_timeout) {
            hook = hook.with_timeout(timeout);
        }

        let hook = self.registry.register_hook(hook)?;
        self.metrics
            .track(&hook.id, &hook.event, hook.counters().clone());

        tracing::debug!(
            hook_id = %hook.id,
            event = %hook.event,
            priority = hook.priority.0,
            "Hook registered"
        );
        Ok(hook.id.clone())
    }

    /// Remove one hook. Its metrics stay readable.
    pub fn unregister(&self, hook_id: &str) -> bool {
        self.registry.unregister_hook(hook_id).is_ok()
    }

    /// Remove every hook for `event`; returns how many were removed.
    pub fn unregister_all(&self, event: &str) -> usize {
        self.registry.unregister_event(event)
    }

    pub fn list(&self, event: Option<&str>) -> Vec<HookInfo> {
        self.registry.list_hooks(event)
    }

    /// Metrics for one hook, one event, or everything.
    pub fn get_metrics(&self, hook_id: Option<&str>, event: Option<&str>) -> Vec<HookMetrics> {
        match hook_id {
            Some(id) => self
                .metrics
                .get(id)
                .filter(|m| event.map_or(true, |e| m.event == e))
                .into_iter()
                .collect(),
            None => self.metrics.list(event),
        }
    }

    /// Enable or disable the whole pipeline.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        tracing::info!(enabled, "Hook pipeline toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable one hook.
    pub fn set_hook_enabled(&self, hook_id: &str, enabled: bool) -> Result<(), RegistryError> {
        if enabled {
            self.registry.enable_hook(hook_id)
        } else {
            self.registry.disable_hook(hook_id)
        }
    }

    /// Remove all hooks and reset all metrics.
    pub fn clear(&self) {
        self.registry.clear();
        self.metrics.reset();
    }

    pub fn hook_count(&self) -> usize {
        self.registry.hook_count()
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Run the pipeline for `event` and return the final context.
    pub async fn trigger(&self, event: &str, context: Value) -> Value {
        self.trigger_detailed(event, context).await.context
    }

    /// Run the pipeline for `event`, reporting what each hook did.
    ///
    /// Hooks run in priority order. A failed or timed-out hook leaves the
    /// context as it was and the next hook continues from there.
    pub async fn trigger_detailed(&self, event: &str, context: Value) -> TriggerOutcome {
        if !self.is_enabled() {
            return TriggerOutcome {
                context,
                executions: Vec::new(),
            };
        }

        let hooks = self.registry.get_hooks_for_event(event);
        if hooks.is_empty() {
            return TriggerOutcome {
                context,
                executions: Vec::new(),
            };
        }

        tracing::debug!(event = %event, hook_count = hooks.len(), "Triggering hooks");

        let mut context = context;
        let mut executions = Vec::with_capacity(hooks.len());

        for hook in hooks {
            if let Some(condition) = &hook.condition {
                if !condition.evaluate(&context) {
                    executions.push(HookExecution {
                        hook_id: hook.id.clone(),
                        status: ExecutionStatus::Skipped,
                        duration: Duration::ZERO,
                    });
                    continue;
                }
            }

            let start = Instant::now();
            let result = execute_hook(&hook, context.clone()).await;
            let duration = start.elapsed();

            hook.counters().record(duration, result.is_err());

            let status = match result {
                Ok(next) => {
                    context = next;
                    ExecutionStatus::Completed
                }
                Err(HookError::Timeout { timeout_ms }) => {
                    tracing::warn!(hook_id = %hook.id, event = %event, timeout_ms, "Hook timed out");
                    ExecutionStatus::TimedOut
                }
                Err(e) => {
                    tracing::warn!(hook_id = %hook.id, event = %event, error = %e, "Hook failed");
                    ExecutionStatus::Failed(e.to_string())
                }
            };

            executions.push(HookExecution {
                hook_id: hook.id.clone(),
                status,
                duration,
            });
        }

        TriggerOutcome {
            context,
            executions,
        }
    }
}

/// Run one handler, raced against its timeout. On timeout the handler
/// future is dropped and its cancellation token fired.
async fn execute_hook(hook: &RegisteredHook, context: Value) -> Result<Value, HookError> {
    let cancel = CancellationToken::new();
    let run = AssertUnwindSafe(hook.handler.handle(context, cancel.clone())).catch_unwind();

    let outcome = match hook.timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.cancel();
                return Err(HookError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        },
        None => run.await,
    };

    outcome.unwrap_or_else(|panic| Err(HookError::Panicked(panic_message(panic.as_ref()))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for creating HookDispatcher with custom settings.
pub struct HookDispatcherBuilder {
    registry: Option<Arc<HookRegistry>>,
    enabled: bool,
    default_timeout: Option<Duration>,
}

impl Default for HookDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HookDispatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: None,
            enabled: true,
            default_timeout: None,
        }
    }

    /// Set the hook registry.
    pub fn with_registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Timeout applied to hooks registered without one.
    pub fn with_default_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.default_timeout = timeout_ms.map(Duration::from_millis);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> HookDispatcher {
        let registry = self.registry.unwrap_or_else(|| Arc::new(HookRegistry::new()));
        let mut dispatcher = HookDispatcher::new(registry);
        dispatcher.enabled = AtomicBool::new(self.enabled);
        dispatcher.default_timeout = self.default_timeout;
        dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionOp, ConditionRule};
    use crate::handlers::{AsyncCallbackHandler, CallbackHandler};
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(order: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl HookHandler {
        CallbackHandler::new(tag, move |ctx| {
            order.lock().push(tag);
            Ok(ctx)
        })
    }

    #[tokio::test]
    async fn test_priority_order() {
        let dispatcher = HookDispatcher::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        dispatcher
            .register(
                "before:llm:request",
                recorder(order.clone(), "p200"),
                RegisterOptions::new().with_priority(200),
            )
            .unwrap();
        dispatcher
            .register(
                "before:llm:request",
                recorder(order.clone(), "p10"),
                RegisterOptions::new().with_priority(10),
            )
            .unwrap();

        dispatcher.trigger("before:llm:request", json!({})).await;
        assert_eq!(*order.lock(), vec!["p10", "p200"]);
    }

    #[tokio::test]
    async fn test_context_threads_through_hooks() {
        let dispatcher = HookDispatcher::default();
        dispatcher
            .register(
                "user:input",
                CallbackHandler::new("append", |mut ctx: Value| {
                    let m = format!("{}!", ctx["message"].as_str().unwrap_or_default());
                    ctx["message"] = json!(m);
                    Ok(ctx)
                }),
                RegisterOptions::new(),
            )
            .unwrap();
        dispatcher
            .register(
                "user:input",
                CallbackHandler::new("again", |mut ctx: Value| {
                    let m = format!("{}?", ctx["message"].as_str().unwrap_or_default());
                    ctx["message"] = json!(m);
                    Ok(ctx)
                }),
                RegisterOptions::new(),
            )
            .unwrap();

        let out = dispatcher.trigger("user:input", json!({"message": "hi"})).await;
        assert_eq!(out["message"], "hi!?");
    }

    #[tokio::test]
    async fn test_condition_skip_does_not_count() {
        let dispatcher = HookDispatcher::default();
        let id = dispatcher
            .register(
                "after:llm:response",
                CallbackHandler::new("long", |_| Ok(json!({"touched": true}))),
                RegisterOptions::new().with_condition(ConditionRule::new(
                    "response",
                    ConditionOp::LengthGt,
                    Some(json!(500)),
                )),
            )
            .unwrap();

        let ctx = json!({"response": "x".repeat(100)});
        let out = dispatcher.trigger("after:llm:response", ctx.clone()).await;

        assert_eq!(out, ctx);
        let metrics = dispatcher.get_metrics(Some(id.as_str()), None);
        assert_eq!(metrics[0].calls, 0);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dispatcher = HookDispatcher::default();
        let bad = dispatcher
            .register(
                "before:tts",
                CallbackHandler::new("bad", |_| Err(HookError::ExecutionFailed("boom".into()))),
                RegisterOptions::new().with_priority(1),
            )
            .unwrap();
        dispatcher
            .register(
                "before:tts",
                CallbackHandler::new("good", |mut ctx: Value| {
                    ctx["ok"] = json!(true);
                    Ok(ctx)
                }),
                RegisterOptions::new().with_priority(2),
            )
            .unwrap();

        let outcome = dispatcher
            .trigger_detailed("before:tts", json!({"text": "hello"}))
            .await;

        assert_eq!(outcome.context, json!({"text": "hello", "ok": true}));
        assert_eq!(outcome.failures(), 1);
        let m = &dispatcher.get_metrics(Some(bad.as_str()), None)[0];
        assert_eq!((m.calls, m.errors), (1, 1));
    }

    #[tokio::test]
    async fn test_panicking_hook_is_isolated() {
        let dispatcher = HookDispatcher::default();
        let id = dispatcher
            .register(
                "before:vision",
                CallbackHandler::new("panics", |_| panic!("hook exploded")),
                RegisterOptions::new(),
            )
            .unwrap();

        let out = dispatcher.trigger("before:vision", json!({"image": "x"})).await;
        assert_eq!(out, json!({"image": "x"}));
        assert_eq!(dispatcher.get_metrics(Some(id.as_str()), None)[0].errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_error_and_fires_cancel() {
        let dispatcher = HookDispatcher::default();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let id = dispatcher
            .register(
                "before:llm:request",
                AsyncCallbackHandler::new("slow", move |ctx, cancel: CancellationToken| {
                    let flag = flag.clone();
                    async move {
                        tokio::spawn(async move {
                            cancel.cancelled().await;
                            flag.store(true, Ordering::SeqCst);
                        });
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(ctx)
                    }
                }),
                RegisterOptions::new().with_timeout_ms(50),
            )
            .unwrap();

        let outcome = dispatcher
            .trigger_detailed("before:llm:request", json!({"message": "hi"}))
            .await;

        assert_eq!(outcome.context, json!({"message": "hi"}));
        assert_eq!(outcome.executions[0].status, ExecutionStatus::TimedOut);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cancelled.load(Ordering::SeqCst));

        let m = &dispatcher.get_metrics(Some(id.as_str()), None)[0];
        assert_eq!((m.calls, m.errors), (1, 1));
    }

    #[tokio::test]
    async fn test_global_disable_skips_everything() {
        let dispatcher = HookDispatcher::default();
        let id = dispatcher
            .register(
                "user:input",
                CallbackHandler::new("mutate", |_| Ok(json!({"changed": true}))),
                RegisterOptions::new(),
            )
            .unwrap();

        dispatcher.set_enabled(false);
        let ctx = json!({"message": "hi"});
        assert_eq!(dispatcher.trigger("user:input", ctx.clone()).await, ctx);
        assert_eq!(dispatcher.get_metrics(Some(id.as_str()), None)[0].calls, 0);

        dispatcher.set_enabled(true);
        assert_eq!(
            dispatcher.trigger("user:input", ctx).await,
            json!({"changed": true})
        );
        assert_eq!(dispatcher.get_metrics(Some(id.as_str()), None)[0].calls, 1);
    }

    #[tokio::test]
    async fn test_metrics_survive_unregister_until_clear() {
        let dispatcher = HookDispatcher::default();
        let id = dispatcher
            .register("after:tts", CallbackHandler::new("n", Ok), RegisterOptions::new())
            .unwrap();
        dispatcher.trigger("after:tts", json!({})).await;

        assert!(dispatcher.unregister(&id));
        assert!(!dispatcher.unregister(&id));
        assert_eq!(dispatcher.get_metrics(Some(id.as_str()), None)[0].calls, 1);

        dispatcher.clear();
        assert!(dispatcher.get_metrics(None, None).is_empty());
        assert_eq!(dispatcher.hook_count(), 0);
    }

    #[tokio::test]
    async fn test_reregistered_id_keeps_accumulating_metrics() {
        let dispatcher = HookDispatcher::default();
        let options = || RegisterOptions::new().with_id("h");

        dispatcher
            .register("user:input", CallbackHandler::new("n", Ok), options())
            .unwrap();
        dispatcher.trigger("user:input", json!({})).await;
        dispatcher.trigger("user:input", json!({})).await;
        assert!(dispatcher.unregister("h"));

        dispatcher
            .register("user:input", CallbackHandler::new("n", Ok), options())
            .unwrap();
        assert_eq!(dispatcher.get_metrics(Some("h"), None)[0].calls, 2);

        dispatcher.trigger("user:input", json!({})).await;
        let metrics = dispatcher.get_metrics(Some("h"), None);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].calls, 3);

        dispatcher.clear();
        dispatcher
            .register("user:input", CallbackHandler::new("n", Ok), options())
            .unwrap();
        assert_eq!(dispatcher.get_metrics(Some("h"), None)[0].calls, 0);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_never_lose_calls() {
        let dispatcher = Arc::new(HookDispatcher::default());
        let id = dispatcher
            .register("user:input", CallbackHandler::new("n", Ok), RegisterOptions::new())
            .unwrap();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let d = dispatcher.clone();
                tokio::spawn(async move { d.trigger("user:input", json!({})).await })
            })
            .collect();
        futures::future::join_all(tasks).await;

        assert_eq!(dispatcher.get_metrics(Some(id.as_str()), None)[0].calls, 50);
    }

    #[test]
    fn test_builder_applies_default_timeout() {
        let dispatcher = HookDispatcherBuilder::new()
            .with_default_timeout_ms(Some(250))
            .build();
        let id = dispatcher
            .register("user:input", CallbackHandler::new("n", Ok), RegisterOptions::new())
            .unwrap();
        assert_eq!(dispatcher.list(None)[0].timeout_ms, Some(250));
        assert!(dispatcher.unregister(&id));
    }
}
