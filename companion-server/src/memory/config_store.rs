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
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

use crate::collaborators::{CollaboratorError, CollaboratorResult, ConfigStore};

/// Key/value settings, optionally persisted to a TOML file.
///
/// Setting a key to `null` removes it (TOML has no null).
pub struct MemoryConfigStore {
    values: RwLock<Map<String, Value>>,
    file: Option<PathBuf>,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(Map::new()),
            file: None,
        }
    }

    /// Load existing values from `path` if it exists; every change is
    /// written back.
    pub fn with_file(path: PathBuf) -> CollaboratorResult<Self> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                CollaboratorError::failed(format!("failed to read {:?}: {}", path, e))
            })?;
            toml::from_str::<Map<String, Value>>(&content).map_err(|e| {
                CollaboratorError::failed(format!("failed to parse {:?}: {}", path, e))
            })?
        } else {
            Map::new()
        };

        Ok(Self {
            values: RwLock::new(values),
            file: Some(path),
        })
    }

    fn persist(&self, values: &Map<String, Value>) -> CollaboratorResult<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let content = toml::to_string(values)
            .map_err(|e| CollaboratorError::failed(format!("failed to encode config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| CollaboratorError::failed(format!("failed to write {:?}: {}", path, e)))?;
        debug!("Persisted {} config values to {:?}", values.len(), path);
        Ok(())
    }

    /// Changes become visible only once persisted.
    fn apply(&self, changes: Map<String, Value>) -> CollaboratorResult<()> {
        let mut values = self.values.write();
        let mut next = values.clone();
        for (key, value) in changes {
            if value.is_null() {
                next.remove(&key);
            } else {
                next.insert(key, value);
            }
        }
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> CollaboratorResult<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> CollaboratorResult<()> {
        let mut change = Map::new();
        change.insert(key.to_string(), value);
        self.apply(change)
    }

    async fn all(&self) -> CollaboratorResult<Map<String, Value>> {
        Ok(self.values.read().clone())
    }

    async fn update(&self, values: Map<String, Value>) -> CollaboratorResult<()> {
        self.apply(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_null_removes() {
        let store = MemoryConfigStore::new();
        store.set("voice", json!("soft")).await.unwrap();
        assert_eq!(store.get("voice").await.unwrap(), Some(json!("soft")));

        store.set("voice", Value::Null).await.unwrap();
        assert_eq!(store.get("voice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persists_to_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.toml");

        let store = MemoryConfigStore::with_file(path.clone()).unwrap();
        let mut values = Map::new();
        values.insert("language".into(), json!("en"));
        values.insert("volume".into(), json!(0.8));
        store.update(values).await.unwrap();

        let reloaded = MemoryConfigStore::with_file(path).unwrap();
        let all = reloaded.all().await.unwrap();
        assert_eq!(all.get("language"), Some(&json!("en")));
        assert_eq!(all.get("volume"), Some(&json!(0.8)));
    }
}
