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

//! JSON-RPC method router and its transport binding.

pub mod batch;
pub mod handlers;
pub(crate) mod namespaces;
pub mod router;
pub mod server;
pub mod session;

pub use handlers::{CallResult, RpcHandler};
pub use router::{paths, rpc_router};
pub use server::{RpcServer, RpcServerState};
pub use session::Session;
