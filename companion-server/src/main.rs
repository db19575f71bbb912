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

use anyhow::Result;
use clap::Parser;
use companion_server::{config::ServerConfig, init_tracing, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Default per-hook timeout in milliseconds
    #[arg(long)]
    hook_timeout_ms: Option<u64>,

    /// Start with the hook pipeline disabled
    #[arg(long)]
    hooks_disabled: bool,

    /// Maximum actions per batch
    #[arg(long)]
    max_batch: Option<usize>,

    /// Session name reported by the health endpoint
    #[arg(long)]
    session_name: Option<String>,

    /// Emit logs as JSON
    #[arg(long, env = "COMPANION_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(timeout) = args.hook_timeout_ms {
        config.hooks.default_timeout_ms = Some(timeout);
    }
    if args.hooks_disabled {
        config.hooks.enabled = false;
    }
    if let Some(max) = args.max_batch {
        config.server.max_batch_size = max;
    }
    if let Some(name) = args.session_name {
        config.session.name = name;
    }

    // Run server
    run_server(config).await?;
    Ok(())
}
