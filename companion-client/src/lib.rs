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

//! Companion Client
//!
//! Caller side of the companion control plane: numbers every request,
//! matches responses back to their caller, enforces per-call deadlines and
//! keeps the connection alive with a configurable reconnect policy.

pub mod client;
pub mod connection;
pub mod error;
mod pending;
pub mod transport;

pub use client::{ClientConfig, RpcClient};
pub use connection::{Backoff, ConnectionState, ReconnectPolicy};
pub use error::{ClientError, Result};
pub use transport::{ChannelConnector, Connection, Connector, TransportError, WsConnector};
