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

use async_trait::async_trait;
use companion_protocol::params::config::ScenarioState;
use parking_lot::RwLock;
use serde_json::Value;

use crate::collaborators::{CollaboratorError, CollaboratorResult, ScenarioManager};

/// Tracks the active scenario. Loading replaces whatever was active.
pub struct MemoryScenarioManager {
    state: RwLock<ScenarioState>,
}

impl Default for MemoryScenarioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScenarioManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ScenarioState::idle()),
        }
    }
}

#[async_trait]
impl ScenarioManager for MemoryScenarioManager {
    async fn load(&self, name: &str, options: Value) -> CollaboratorResult<ScenarioState> {
        let next = ScenarioState {
            active: true,
            name: Some(name.to_string()),
            options,
        };
        *self.state.write() = next.clone();
        Ok(next)
    }

    async fn unload(&self) -> CollaboratorResult<String> {
        let mut state = self.state.write();
        match state.name.take() {
            Some(name) => {
                *state = ScenarioState::idle();
                Ok(name)
            }
            None => Err(CollaboratorError::unavailable("no scenario is loaded")),
        }
    }

    async fn state(&self) -> CollaboratorResult<ScenarioState> {
        Ok(self.state.read().clone())
    }
}
