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
use companion_protocol::params::media::{PlaybackParams, ScreenshotResult, SendAudioParams};
use parking_lot::Mutex;

use crate::collaborators::{AudioBackend, CollaboratorError, CollaboratorResult, VisionBackend};

/// A transparent 1x1 PNG, base64 encoded.
pub(crate) const BLANK_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Only PNG can be produced without a renderer.
pub(crate) fn blank_screenshot(format: Option<&str>) -> CollaboratorResult<ScreenshotResult> {
    match format.unwrap_or("png") {
        "png" => Ok(ScreenshotResult {
            image: BLANK_PNG.to_string(),
            format: "png".to_string(),
        }),
        other => Err(CollaboratorError::failed(format!(
            "unsupported screenshot format: {}",
            other
        ))),
    }
}

#[derive(Default)]
struct AudioLog {
    received: Vec<SendAudioParams>,
    played: Vec<PlaybackParams>,
}

/// Audio sink that keeps what it was sent. Has no recognizer.
#[derive(Default)]
pub struct MemoryAudio {
    log: Mutex<AudioLog>,
}

impl MemoryAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> usize {
        self.log.lock().received.len()
    }

    pub fn played(&self) -> usize {
        self.log.lock().played.len()
    }
}

#[async_trait]
impl AudioBackend for MemoryAudio {
    async fn send(&self, audio: SendAudioParams) -> CollaboratorResult<()> {
        self.log.lock().received.push(audio);
        Ok(())
    }

    async fn transcribe(
        &self,
        _data: &str,
        _format: Option<&str>,
        _language: Option<&str>,
    ) -> CollaboratorResult<String> {
        Err(CollaboratorError::unavailable("no speech recognizer attached"))
    }

    async fn playback(&self, request: PlaybackParams) -> CollaboratorResult<()> {
        self.log.lock().played.push(request);
        Ok(())
    }
}

/// Describes images by size; never looks at the pixels.
pub struct EchoVision;

#[async_trait]
impl VisionBackend for EchoVision {
    async fn process_image(&self, image: &str, prompt: Option<&str>) -> CollaboratorResult<String> {
        let description = match prompt {
            Some(prompt) => format!("An image of {} bytes ({})", image.len(), prompt),
            None => format!("An image of {} bytes", image.len()),
        };
        Ok(description)
    }

    async fn capture_screenshot(&self, format: Option<&str>) -> CollaboratorResult<ScreenshotResult> {
        blank_screenshot(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_audio_records_and_cannot_transcribe() {
        let audio = MemoryAudio::new();
        audio
            .send(SendAudioParams {
                data: "AAAA".into(),
                format: Some("pcm".into()),
                sample_rate: Some(16_000),
            })
            .await
            .unwrap();
        assert_eq!(audio.received(), 1);

        let err = audio.transcribe("AAAA", None, None).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_vision() {
        let description = EchoVision.process_image("abcd", Some("what is it")).await.unwrap();
        assert_eq!(description, "An image of 4 bytes (what is it)");

        let shot = EchoVision.capture_screenshot(None).await.unwrap();
        assert_eq!(shot.format, "png");
        assert!(EchoVision.capture_screenshot(Some("webp")).await.is_err());
    }
}
