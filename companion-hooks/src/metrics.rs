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

//! Per-hook call metrics.
//!
//! Counters are plain atomics shared between the registered hook and the
//! metrics table, so concurrent triggers never lose an update. Records
//! outlive unregistration and are dropped only by [`MetricsTable::reset`].

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Live counters for one hook id.
#[derive(Debug, Default)]
pub struct HookCounters {
    calls: AtomicU64,
    total_duration_us: AtomicU64,
    errors: AtomicU64,
}

impl HookCounters {
    /// Record one trigger attempt.
    pub fn record(&self, elapsed: Duration, failed: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Point-in-time metrics for one hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookMetrics {
    pub hook_id: String,
    pub event: String,
    pub calls: u64,
    pub total_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub errors: u64,
}

struct MetricsEntry {
    event: String,
    counters: Arc<HookCounters>,
}

impl MetricsEntry {
    fn snapshot(&self, hook_id: &str) -> HookMetrics {
        let calls = self.counters.calls();
        let total_duration_ms =
            self.counters.total_duration_us.load(Ordering::Relaxed) as f64 / 1000.0;
        HookMetrics {
            hook_id: hook_id.to_string(),
            event: self.event.clone(),
            calls,
            total_duration_ms,
            avg_duration_ms: if calls == 0 {
                0.0
            } else {
                total_duration_ms / calls as f64
            },
            errors: self.counters.errors(),
        }
    }
}

/// Metrics records indexed by hook id.
#[derive(Default)]
pub struct MetricsTable {
    entries: DashMap<String, MetricsEntry>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `counters` under `hook_id`. An existing record keeps
    /// its counters; only its event is updated.
    pub fn track(&self, hook_id: &str, event: &str, counters: Arc<HookCounters>) {
        self.entries
            .entry(hook_id.to_string())
            .and_modify(|entry| entry.event = event.to_string())
            .or_insert_with(|| MetricsEntry {
                event: event.to_string(),
                counters,
            });
    }

    /// Counters already recorded for `hook_id`, if any.
    pub fn counters(&self, hook_id: &str) -> Option<Arc<HookCounters>> {
        self.entries.get(hook_id).map(|e| e.counters.clone())
    }

    pub fn get(&self, hook_id: &str) -> Option<HookMetrics> {
        self.entries.get(hook_id).map(|e| e.snapshot(hook_id))
    }

    /// All records, optionally restricted to one event, ordered by hook id.
    pub fn list(&self, event: Option<&str>) -> Vec<HookMetrics> {
        let mut all: Vec<HookMetrics> = self
            .entries
            .iter()
            .filter(|e| event.map_or(true, |ev| e.event == ev))
            .map(|e| e.snapshot(e.key()))
            .collect();
        all.sort_by(|a, b| a.hook_id.cmp(&b.hook_id));
        all
    }

    pub fn reset(&self) {
        self.entries.clear();
    }
}
