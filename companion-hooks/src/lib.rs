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

//! Hook Pipeline Engine
//!
//! An event-keyed registry of interceptors that observe and rewrite the
//! context flowing through the companion pipeline (user input, language
//! model calls, speech synthesis, vision).
//!
//! # Architecture
//!
//! - Lower priority values execute first; ties run in registration order
//! - Hooks run sequentially within one trigger, each seeing the previous
//!   hook's output
//! - Optional per-hook condition: a false condition skips the hook and is
//!   not counted as a call
//! - Optional per-hook timeout: the handler future is dropped and its
//!   cancellation token fired
//! - Failures, panics and timeouts are isolated and recorded in metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use companion_hooks::{points, CallbackHandler, HookDispatcher, RegisterOptions};
//!
//! let hooks = HookDispatcher::default();
//! hooks.register(
//!     points::BEFORE_LLM_REQUEST,
//!     CallbackHandler::new("persona", |mut ctx| {
//!         ctx["persona"] = "cheerful".into();
//!         Ok(ctx)
//!     }),
//!     RegisterOptions::new().with_priority(10),
//! )?;
//!
//! let ctx = hooks.trigger(points::BEFORE_LLM_REQUEST, json!({"message": "hi"})).await;
//! ```

mod condition;
mod config;
mod dispatcher;
mod handlers;
mod metrics;
pub mod points;
mod registry;

pub use condition::{Condition, ConditionOp, ConditionRule, ContextPredicate};
pub use config::{HookConfig, HookConfigError, HookDefinition};
pub use dispatcher::{
    ExecutionStatus, HookDispatcher, HookDispatcherBuilder, HookExecution, RegisterOptions,
    TriggerOutcome,
};
pub use handlers::{
    AsyncCallbackHandler, AsyncHookHandler, CallbackHandler, HookError, HookHandler, NoOpHandler,
    PatchHandler, PatchObserver,
};
pub use metrics::{HookCounters, HookMetrics, MetricsTable};
pub use registry::{HookInfo, HookPriority, HookRegistry, RegisteredHook, RegistryError};
pub use tokio_util::sync::CancellationToken;
