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

//! In-memory collaborators.
//!
//! Enough behavior to drive the control plane end to end without a language
//! model, speech engine or renderer attached. The binary and the tests use
//! these.

mod character;
mod chat;
mod config_store;
mod media;
mod scenario;
mod scene;

pub use character::{CharacterSnapshot, RecordingCharacter};
pub use chat::EchoChatBackend;
pub use config_store::MemoryConfigStore;
pub use media::{EchoVision, MemoryAudio};
pub use scenario::MemoryScenarioManager;
pub use scene::MemoryScene;

use std::path::PathBuf;
use std::sync::Arc;

use crate::collaborators::{CollaboratorResult, Collaborators};

impl Collaborators {
    /// Bundle of in-memory collaborators. `config_file` persists the
    /// config store as TOML.
    pub fn in_memory(config_file: Option<PathBuf>) -> CollaboratorResult<Self> {
        let config = match config_file {
            Some(path) => MemoryConfigStore::with_file(path)?,
            None => MemoryConfigStore::new(),
        };

        Ok(Self {
            chat: Arc::new(EchoChatBackend::new()),
            audio: Arc::new(MemoryAudio::new()),
            character: Arc::new(RecordingCharacter::new()),
            vision: Arc::new(EchoVision),
            config: Arc::new(config),
            scenario: Arc::new(MemoryScenarioManager::new()),
            scene: Arc::new(MemoryScene::new()),
        })
    }
}
