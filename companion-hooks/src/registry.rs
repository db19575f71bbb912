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

//! Hook registry for managing registered hooks.

use crate::condition::{Condition, ConditionRule};
use crate::handlers::AsyncHookHandler;
use crate::metrics::HookCounters;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Priority level for hook execution.
/// Lower values execute first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookPriority(pub i32);

impl Default for HookPriority {
    fn default() -> Self {
        HookPriority(100)
    }
}

/// A registered hook with its handler and metadata.
pub struct RegisteredHook {
    /// Unique identifier for this hook registration.
    pub id: String,
    /// Event this hook listens to.
    pub event: String,
    /// Display name; defaults to the handler name.
    pub name: String,
    /// The handler to execute.
    pub handler: AsyncHookHandler,
    /// Priority for execution order.
    pub priority: HookPriority,
    /// Skip the hook when this evaluates to false.
    pub condition: Option<Condition>,
    /// Per-hook timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    enabled: AtomicBool,
    seq: u64,
    counters: Arc<HookCounters>,
}

impl RegisteredHook {
    /// Create a new registered hook.
    pub fn new(id: impl Into<String>, event: impl Into<String>, handler: AsyncHookHandler) -> Self {
        let name = handler.name().to_string();
        Self {
            id: id.into(),
            event: event.into(),
            name,
            handler,
            priority: HookPriority::default(),
            condition: None,
            timeout: None,
            enabled: AtomicBool::new(true),
            seq: 0,
            counters: Arc::new(HookCounters::default()),
        }
    }

    /// Set the priority for this hook.
    pub fn with_priority(mut self, priority: HookPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Continue counting into existing counters (re-registration of an id).
    pub fn with_counters(mut self, counters: Arc<HookCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Metrics counters owned by this hook.
    pub fn counters(&self) -> &Arc<HookCounters> {
        &self.counters
    }

    /// Serializable description of the hook.
    pub fn info(&self) -> HookInfo {
        HookInfo {
            id: self.id.clone(),
            event: self.event.clone(),
            name: self.name.clone(),
            priority: self.priority.0,
            timeout_ms: self.timeout.map(|t| t.as_millis() as u64),
            enabled: self.is_enabled(),
            conditional: self.condition.is_some(),
            condition: self.condition.as_ref().and_then(Condition::rule).cloned(),
        }
    }

    fn order_key(&self) -> (HookPriority, u64) {
        (self.priority, self.seq)
    }
}

impl std::fmt::Debug for RegisteredHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHook")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// What `hooks.list` reports about a hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInfo {
    pub id: String,
    pub event: String,
    pub name: String,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub enabled: bool,
    pub conditional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionRule>,
}

/// Registry for hooks, indexed by event and by id.
///
/// Per-event lists stay sorted by `(priority, registration sequence)`, which
/// makes execution order total and stable for equal priorities.
pub struct HookRegistry {
    /// Registered hooks indexed by event.
    hooks_by_event: DashMap<String, Vec<Arc<RegisteredHook>>>,
    /// All registered hooks by ID.
    hooks_by_id: DashMap<String, Arc<RegisteredHook>>,
    next_seq: AtomicU64,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Create a new empty hook registry.
    pub fn new() -> Self {
        Self {
            hooks_by_event: DashMap::new(),
            hooks_by_id: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a hook for an event.
    pub fn register_hook(&self, mut hook: RegisteredHook) -> Result<Arc<RegisteredHook>, RegistryError> {
        if hook.event.is_empty() {
            return Err(RegistryError::InvalidEvent(hook.event));
        }

        match self.hooks_by_id.entry(hook.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::HookAlreadyExists(hook.id)),
            Entry::Vacant(slot) => {
                hook.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                let hook = Arc::new(hook);
                slot.insert(hook.clone());

                let mut hooks = self
                    .hooks_by_event
                    .entry(hook.event.clone())
                    .or_insert_with(Vec::new);
                let at = hooks.partition_point(|h| h.order_key() <= hook.order_key());
                hooks.insert(at, hook.clone());

                Ok(hook)
            }
        }
    }

    /// Unregister a hook by ID.
    pub fn unregister_hook(&self, id: &str) -> Result<Arc<RegisteredHook>, RegistryError> {
        let (_, hook) = self
            .hooks_by_id
            .remove(id)
            .ok_or_else(|| RegistryError::HookNotFound(id.to_string()))?;

        // Match by identity: the id may already belong to a newer registration.
        if let Some(mut hooks) = self.hooks_by_event.get_mut(&hook.event) {
            hooks.retain(|h| !Arc::ptr_eq(h, &hook));
        }

        Ok(hook)
    }

    /// Remove every hook registered for `event`; returns how many went.
    pub fn unregister_event(&self, event: &str) -> usize {
        let Some((_, hooks)) = self.hooks_by_event.remove(event) else {
            return 0;
        };
        for hook in &hooks {
            self.hooks_by_id.remove(&hook.id);
        }
        hooks.len()
    }

    /// Enabled hooks for an event, in execution order.
    pub fn get_hooks_for_event(&self, event: &str) -> Vec<Arc<RegisteredHook>> {
        self.hooks_by_event
            .get(event)
            .map(|hooks| hooks.iter().filter(|h| h.is_enabled()).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_hook(&self, id: &str) -> Option<Arc<RegisteredHook>> {
        self.hooks_by_id.get(id).map(|h| h.clone())
    }

    /// Enable a hook by ID.
    pub fn enable_hook(&self, id: &str) -> Result<(), RegistryError> {
        self.set_hook_enabled(id, true)
    }

    /// Disable a hook by ID.
    pub fn disable_hook(&self, id: &str) -> Result<(), RegistryError> {
        self.set_hook_enabled(id, false)
    }

    fn set_hook_enabled(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        let hook = self
            .hooks_by_id
            .get(id)
            .ok_or_else(|| RegistryError::HookNotFound(id.to_string()))?;
        hook.set_enabled(enabled);
        Ok(())
    }

    /// List hooks, optionally for one event, grouped by event in execution order.
    pub fn list_hooks(&self, event: Option<&str>) -> Vec<HookInfo> {
        let mut events: Vec<String> = match event {
            Some(e) => vec![e.to_string()],
            None => self.hooks_by_event.iter().map(|r| r.key().clone()).collect(),
        };
        events.sort();

        events
            .iter()
            .filter_map(|e| self.hooks_by_event.get(e))
            .flat_map(|hooks| hooks.iter().map(|h| h.info()).collect::<Vec<_>>())
            .collect()
    }

    /// Get the number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks_by_id.len()
    }

    /// Clear all hooks.
    pub fn clear(&self) {
        self.hooks_by_event.clear();
        self.hooks_by_id.clear();
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Hook already exists: {0}")]
    HookAlreadyExists(String),

    #[error("Hook not found: {0}")]
    HookNotFound(String),

    #[error("Invalid hook event: {0:?}")]
    InvalidEvent(String),
}
