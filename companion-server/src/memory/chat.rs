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
use companion_protocol::params::chat::{ChatMessage, ChatState};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::collaborators::{ChatBackend, ChunkStream, CollaboratorResult};

/// How long the companion stays awake after the last message.
const AWAKE_WINDOW: Duration = Duration::from_secs(300);

struct ChatInner {
    messages: Vec<ChatMessage>,
    last_activity: Option<Instant>,
}

/// Replies with `You said: <message>` and keeps the conversation history.
pub struct EchoChatBackend {
    inner: Mutex<ChatInner>,
    processing: Arc<AtomicBool>,
    started: Instant,
}

impl Default for EchoChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoChatBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChatInner {
                messages: Vec::new(),
                last_activity: None,
            }),
            processing: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
        }
    }

    fn reply_to(message: &str) -> String {
        format!("You said: {}", message)
    }

    /// Record one exchange and return the reply.
    fn exchange(&self, message: &str) -> String {
        let reply = Self::reply_to(message);
        let mut inner = self.inner.lock();
        inner.messages.push(ChatMessage::user(message));
        inner.messages.push(ChatMessage::assistant(reply.clone()));
        inner.last_activity = Some(Instant::now());
        reply
    }

    fn idle(&self) -> Duration {
        let inner = self.inner.lock();
        inner.last_activity.unwrap_or(self.started).elapsed()
    }

    fn awake(&self) -> bool {
        let inner = self.inner.lock();
        inner
            .last_activity
            .map(|at| at.elapsed() < AWAKE_WINDOW)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ChatBackend for EchoChatBackend {
    async fn send_message(&self, message: &str) -> CollaboratorResult<String> {
        Ok(self.exchange(message))
    }

    async fn stream_message(&self, message: &str) -> CollaboratorResult<ChunkStream> {
        let reply = self.exchange(message);
        let chunks: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();

        self.processing.store(true, Ordering::SeqCst);
        let processing = self.processing.clone();
        let done = stream::once(async move {
            processing.store(false, Ordering::SeqCst);
            None::<CollaboratorResult<String>>
        })
        .filter_map(|item| async move { item });

        Ok(stream::iter(chunks.into_iter().map(Ok)).chain(done).boxed())
    }

    async fn interrupt(&self) -> CollaboratorResult<bool> {
        Ok(self.processing.swap(false, Ordering::SeqCst))
    }

    async fn state(&self) -> CollaboratorResult<ChatState> {
        let message_count = self.inner.lock().messages.len();
        Ok(ChatState {
            awake: self.awake(),
            processing: self.processing.load(Ordering::SeqCst),
            message_count,
            idle_time_ms: self.idle().as_millis() as u64,
        })
    }

    async fn messages(&self) -> CollaboratorResult<Vec<ChatMessage>> {
        Ok(self.inner.lock().messages.clone())
    }

    async fn set_messages(&self, messages: Vec<ChatMessage>) -> CollaboratorResult<()> {
        self.inner.lock().messages = messages;
        Ok(())
    }

    async fn is_awake(&self) -> CollaboratorResult<bool> {
        Ok(self.awake())
    }

    async fn idle_time(&self) -> CollaboratorResult<Duration> {
        Ok(self.idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_and_history() {
        let chat = EchoChatBackend::new();
        assert!(!chat.is_awake().await.unwrap());

        let reply = chat.send_message("hello").await.unwrap();
        assert_eq!(reply, "You said: hello");
        assert!(chat.is_awake().await.unwrap());

        let messages = chat.messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("hello"));

        chat.set_messages(vec![]).await.unwrap();
        assert_eq!(chat.state().await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_stream_reassembles_reply() {
        let chat = EchoChatBackend::new();
        let stream = chat.stream_message("how are you").await.unwrap();
        assert!(chat.state().await.unwrap().processing);

        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), "You said: how are you");
        assert!(chunks.len() > 1);
        assert!(!chat.state().await.unwrap().processing);
        assert!(!chat.interrupt().await.unwrap());
    }
}
