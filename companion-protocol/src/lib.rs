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

//! Wire protocol for the companion control plane.
//!
//! - [`protocol`]: JSON-RPC 2.0 envelopes and the codec
//! - [`error`]: the error code taxonomy
//! - [`methods`]: the closed `namespace.action` method table
//! - [`params`]: typed params and results per namespace

pub mod error;
pub mod methods;
pub mod params;
pub mod protocol;

pub use error::{codes, RpcError};
pub use methods::{Method, MethodCall, Namespace};
pub use params::{AckResult, NoParams, Validate, Vec3};
pub use protocol::{
    decode, decode_value, encode, DecodeError, Decoded, Incoming, JsonRpcError, JsonRpcId,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION,
};
