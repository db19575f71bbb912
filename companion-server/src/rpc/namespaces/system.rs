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

use companion_hooks::points;
use companion_protocol::params::system::{CapabilitiesResult, PingResult, VersionResult};
use companion_protocol::{Method, Namespace, JSONRPC_VERSION};

use super::respond;
use crate::rpc::handlers::CallResult;

pub(crate) const SERVER_NAME: &str = "companion-server";

pub(crate) fn ping() -> CallResult {
    respond(PingResult {
        pong: true,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub(crate) fn version() -> CallResult {
    respond(VersionResult {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol: JSONRPC_VERSION.to_string(),
    })
}

pub(crate) fn capabilities() -> CallResult {
    respond(CapabilitiesResult {
        methods: Method::ALL.iter().map(|m| m.as_str().to_string()).collect(),
        namespaces: Namespace::ALL.iter().map(|n| n.as_str().to_string()).collect(),
        hook_events: points::ALL.iter().map(|e| e.to_string()).collect(),
        transports: vec!["websocket".to_string(), "http".to_string()],
    })
}
