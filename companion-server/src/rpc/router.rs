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

//! RPC Router
//!
//! Axum router configuration for the JSON-RPC endpoints.

use axum::Router;
use std::sync::Arc;

use super::handlers::RpcHandler;
use super::server::RpcServer;

/// Create the RPC router with all endpoints
pub fn rpc_router(handler: Arc<RpcHandler>, session_name: impl Into<String>) -> Router {
    RpcServer::new(handler, session_name).router()
}

/// RPC endpoint paths
pub mod paths {
    /// HTTP POST endpoint for JSON-RPC requests
    pub const RPC_HTTP: &str = "/rpc";
    /// WebSocket endpoint for bidirectional communication
    pub const RPC_WS: &str = "/rpc/ws";
    /// Health check endpoint (GET)
    pub const RPC_HEALTH: &str = "/rpc/health";
}
