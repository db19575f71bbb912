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
use companion_protocol::Vec3;
use parking_lot::RwLock;
use std::time::Duration;

use crate::collaborators::{CharacterController, CollaboratorResult};

/// Rough speaking rate used to estimate utterance length.
const MS_PER_WORD: u64 = 320;

/// Everything the character has been told to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterSnapshot {
    pub expression: Option<(String, f64)>,
    pub emotion: Option<(String, f64)>,
    pub speaking: bool,
    pub spoken: Vec<String>,
    pub animation: Option<(String, bool)>,
    pub look_at: Option<Vec3>,
    pub auto_look_at: bool,
    pub auto_blink: bool,
    pub model_url: Option<String>,
}

/// Character controller that only records commands.
pub struct RecordingCharacter {
    state: RwLock<CharacterSnapshot>,
}

impl Default for RecordingCharacter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCharacter {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CharacterSnapshot {
                auto_look_at: true,
                auto_blink: true,
                ..Default::default()
            }),
        }
    }

    pub fn snapshot(&self) -> CharacterSnapshot {
        self.state.read().clone()
    }
}

#[async_trait]
impl CharacterController for RecordingCharacter {
    async fn set_expression(&self, expression: &str, weight: f64) -> CollaboratorResult<()> {
        self.state.write().expression = Some((expression.to_string(), weight));
        Ok(())
    }

    async fn set_emotion(&self, emotion: &str, intensity: f64) -> CollaboratorResult<()> {
        self.state.write().emotion = Some((emotion.to_string(), intensity));
        Ok(())
    }

    async fn speak(&self, text: &str, emotion: Option<&str>) -> CollaboratorResult<Option<Duration>> {
        let mut state = self.state.write();
        if let Some(emotion) = emotion {
            state.emotion = Some((emotion.to_string(), 1.0));
        }
        state.speaking = true;
        state.spoken.push(text.to_string());

        let words = text.split_whitespace().count() as u64;
        Ok(Some(Duration::from_millis(words * MS_PER_WORD)))
    }

    async fn stop_speaking(&self) -> CollaboratorResult<()> {
        self.state.write().speaking = false;
        Ok(())
    }

    async fn play_animation(&self, name: &str, looped: bool) -> CollaboratorResult<()> {
        self.state.write().animation = Some((name.to_string(), looped));
        Ok(())
    }

    async fn look_at(&self, target: Vec3) -> CollaboratorResult<()> {
        self.state.write().look_at = Some(target);
        Ok(())
    }

    async fn set_auto_look_at(&self, enabled: bool) -> CollaboratorResult<()> {
        self.state.write().auto_look_at = enabled;
        Ok(())
    }

    async fn set_auto_blink(&self, enabled: bool) -> CollaboratorResult<()> {
        self.state.write().auto_blink = enabled;
        Ok(())
    }

    async fn load_model(&self, url: &str) -> CollaboratorResult<()> {
        self.state.write().model_url = Some(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_commands() {
        let character = RecordingCharacter::new();
        character.set_expression("happy", 0.5).await.unwrap();
        let duration = character.speak("hello there", Some("joy")).await.unwrap();
        character.set_auto_blink(false).await.unwrap();

        let snapshot = character.snapshot();
        assert_eq!(snapshot.expression, Some(("happy".to_string(), 0.5)));
        assert_eq!(snapshot.emotion, Some(("joy".to_string(), 1.0)));
        assert_eq!(snapshot.spoken, vec!["hello there".to_string()]);
        assert!(snapshot.speaking);
        assert!(!snapshot.auto_blink);
        assert_eq!(duration, Some(Duration::from_millis(2 * MS_PER_WORD)));

        character.stop_speaking().await.unwrap();
        assert!(!character.snapshot().speaking);
    }
}
