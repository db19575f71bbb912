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

//! `chat.*`: the conversation, with the input and language model hooks
//! wrapped around the backend.

use companion_hooks::points;
use companion_protocol::params::chat::{
    AwakeResult, CreateStreamResult, IdleTimeResult, InterruptResult, MessageList,
    SendMessageParams, SendMessageResult,
};
use companion_protocol::{AckResult, Namespace, RpcError};
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use super::{is_cancelled, respond, string_field};
use crate::collaborators::CollaboratorError;
use crate::events::names;
use crate::rpc::handlers::{CallResult, RpcHandler};

fn chat_error(e: CollaboratorError) -> RpcError {
    e.into_rpc(Namespace::Chat)
}

/// Run `user:input` then `before:llm:request`. `None` when a hook cancelled.
async fn prepare(h: &RpcHandler, message: String) -> Option<String> {
    let context = h
        .hooks
        .trigger(points::USER_INPUT, json!({ "message": &message }))
        .await;
    let message = string_field(&context, "message").unwrap_or(message);

    let context = h
        .hooks
        .trigger(points::BEFORE_LLM_REQUEST, json!({ "message": &message }))
        .await;
    if is_cancelled(&context) {
        debug!("Chat request cancelled by hook");
        return None;
    }
    Some(string_field(&context, "message").unwrap_or(message))
}

pub(crate) async fn send_message(h: &RpcHandler, params: SendMessageParams) -> CallResult {
    let Some(message) = prepare(h, params.message).await else {
        return respond(SendMessageResult {
            response: None,
            cancelled: true,
        });
    };

    let response = h
        .collaborators
        .chat
        .send_message(&message)
        .await
        .map_err(chat_error)?;

    let context = h
        .hooks
        .trigger(
            points::AFTER_LLM_RESPONSE,
            json!({ "message": &message, "response": &response }),
        )
        .await;
    let response = string_field(&context, "response").unwrap_or(response);

    h.events.publish(
        names::CHAT_MESSAGE,
        json!({ "message": message, "response": &response }),
    );
    respond(SendMessageResult {
        response: Some(response),
        cancelled: false,
    })
}

enum StreamEnd {
    Complete,
    Interrupted,
    Failed(String),
}

/// Start a streamed reply. Chunks arrive as `chat.stream` events.
pub(crate) async fn create_stream(h: &RpcHandler, params: SendMessageParams) -> CallResult {
    let stream_id = uuid::Uuid::new_v4().to_string();

    let Some(message) = prepare(h, params.message).await else {
        return respond(CreateStreamResult {
            stream_id,
            cancelled: true,
        });
    };

    let mut chunks = h
        .collaborators
        .chat
        .stream_message(&message)
        .await
        .map_err(chat_error)?;

    let cancel = tokio_util::sync::CancellationToken::new();
    h.streams.insert(stream_id.clone(), cancel.clone());

    let id = stream_id.clone();
    let hooks = h.hooks.clone();
    let events = h.events.clone();
    let streams = h.streams.clone();
    tokio::spawn(async move {
        let mut response = String::new();
        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break StreamEnd::Interrupted,
                chunk = chunks.next() => match chunk {
                    Some(Ok(delta)) => {
                        response.push_str(&delta);
                        events.publish(names::CHAT_STREAM, json!({ "streamId": &id, "delta": delta }));
                    }
                    Some(Err(e)) => break StreamEnd::Failed(e.to_string()),
                    None => break StreamEnd::Complete,
                },
            }
        };
        streams.remove(&id);

        match end {
            StreamEnd::Complete => {
                let context = hooks
                    .trigger(
                        points::AFTER_LLM_RESPONSE,
                        json!({ "message": &message, "response": &response }),
                    )
                    .await;
                let response = string_field(&context, "response").unwrap_or(response);
                events.publish(
                    names::CHAT_STREAM,
                    json!({ "streamId": &id, "done": true, "response": &response }),
                );
                events.publish(
                    names::CHAT_MESSAGE,
                    json!({ "message": message, "response": response }),
                );
            }
            StreamEnd::Interrupted => {
                debug!(stream_id = %id, "Chat stream interrupted");
                events.publish(
                    names::CHAT_STREAM,
                    json!({ "streamId": &id, "done": true, "interrupted": true, "response": response }),
                );
            }
            StreamEnd::Failed(error) => {
                warn!(stream_id = %id, "Chat stream failed: {}", error);
                events.publish(
                    names::CHAT_STREAM,
                    json!({ "streamId": &id, "done": true, "error": error, "response": response }),
                );
            }
        }
    });

    respond(CreateStreamResult {
        stream_id,
        cancelled: false,
    })
}

pub(crate) async fn interrupt(h: &RpcHandler) -> CallResult {
    let ids: Vec<String> = h.streams.iter().map(|entry| entry.key().clone()).collect();
    let mut streams = 0usize;
    for id in ids {
        if let Some((_, cancel)) = h.streams.remove(&id) {
            cancel.cancel();
            streams += 1;
        }
    }

    let backend = h.collaborators.chat.interrupt().await.map_err(chat_error)?;
    let interrupted = backend || streams > 0;
    if interrupted {
        h.events
            .publish(names::CHAT_INTERRUPTED, json!({ "streams": streams }));
    }
    respond(InterruptResult { interrupted })
}

pub(crate) async fn state(h: &RpcHandler) -> CallResult {
    respond(h.collaborators.chat.state().await.map_err(chat_error)?)
}

pub(crate) async fn messages(h: &RpcHandler) -> CallResult {
    let messages = h.collaborators.chat.messages().await.map_err(chat_error)?;
    respond(MessageList { messages })
}

pub(crate) async fn set_messages(h: &RpcHandler, params: MessageList) -> CallResult {
    h.collaborators
        .chat
        .set_messages(params.messages)
        .await
        .map_err(chat_error)?;
    respond(AckResult::ok())
}

pub(crate) async fn is_awake(h: &RpcHandler) -> CallResult {
    let awake = h.collaborators.chat.is_awake().await.map_err(chat_error)?;
    respond(AwakeResult { awake })
}

pub(crate) async fn idle_time(h: &RpcHandler) -> CallResult {
    let idle = h.collaborators.chat.idle_time().await.map_err(chat_error)?;
    respond(IdleTimeResult {
        idle_time_ms: idle.as_millis() as u64,
    })
}
