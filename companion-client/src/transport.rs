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

//! Connectors: how the client obtains a connection.
//!
//! A [`Connection`] is a pair of text-frame channels. Dropping its
//! `outbound` sender closes it; `inbound` yields `None` once the peer is
//! gone.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
}

/// A live connection as two text-frame channels.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// WebSocket connector.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        debug!("Connecting to {}", self.url);
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("WebSocket connect failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!("Dropping non UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("WebSocket read failed: {}", e);
                        break;
                    }
                };
                if in_tx.send(text).is_err() {
                    break;
                }
            }
        });

        Ok(Connection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// In-memory connector. Every successful `connect` hands the peer's end of
/// the new connection to the accept queue returned by [`ChannelConnector::new`].
pub struct ChannelConnector {
    accept_tx: mpsc::UnboundedSender<Connection>,
    available: Arc<AtomicBool>,
}

impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Connection>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                accept_tx,
                available: Arc::new(AtomicBool::new(true)),
            },
            accept_rx,
        )
    }

    /// While unavailable, every `connect` fails.
    pub fn availability(&self) -> Arc<AtomicBool> {
        self.available.clone()
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed("peer unavailable".into()));
        }

        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        self.accept_tx
            .send(Connection {
                outbound: to_client,
                inbound: from_client,
            })
            .map_err(|_| TransportError::ConnectFailed("peer is gone".into()))?;

        Ok(Connection {
            outbound: to_peer,
            inbound: from_peer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_connector_pairs_ends() {
        let (connector, mut accepted) = ChannelConnector::new();
        let mut client = connector.connect().await.unwrap();
        let mut peer = accepted.recv().await.unwrap();

        client.outbound.send("ping".into()).unwrap();
        assert_eq!(peer.inbound.recv().await.as_deref(), Some("ping"));

        peer.outbound.send("pong".into()).unwrap();
        assert_eq!(client.inbound.recv().await.as_deref(), Some("pong"));

        drop(peer);
        assert_eq!(client.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_connector_fails() {
        let (connector, _accepted) = ChannelConnector::new();
        connector.availability().store(false, Ordering::SeqCst);
        assert!(connector.connect().await.is_err());
    }
}
