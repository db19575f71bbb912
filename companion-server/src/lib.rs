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

//! Companion Server
//!
//! JSON-RPC 2.0 control plane for a live 3D companion session. Remote
//! callers drive the conversation, voice, character, scene and hook
//! pipeline over WebSocket (`/rpc/ws`) or HTTP (`POST /rpc`).

pub mod collaborators;
pub mod config;
pub mod events;
pub mod memory;
pub mod rpc;

use axum::Router;
use companion_hooks::{HookDispatcherBuilder, RegistryError};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use collaborators::{CollaboratorError, Collaborators};
use config::{ConfigError, ServerConfig};
use events::EventBus;
use rpc::RpcHandler;

pub use rpc::{paths, rpc_router, Session};

const DEFAULT_LOG_FILTER: &str = "companion_server=info,companion_hooks=info,tower_http=info";

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to initialize collaborators: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Failed to preload hook: {0}")]
    Hook(#[from] RegistryError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Does nothing if a subscriber is already installed.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Build the method router: hook pipeline (with preloaded hooks), event bus
/// and collaborators.
pub fn build_handler(
    config: &ServerConfig,
    collaborators: Collaborators,
) -> Result<Arc<RpcHandler>, ServerError> {
    let hooks = Arc::new(
        HookDispatcherBuilder::new()
            .with_default_timeout_ms(config.hooks.default_timeout_ms)
            .with_enabled(config.hooks.enabled)
            .build(),
    );
    let events = EventBus::default();

    for definition in &config.hooks.preload {
        let hook_id = rpc::namespaces::hooks::install(&hooks, &events, definition)?;
        tracing::info!(hook_id = %hook_id, event = %definition.event, "Preloaded hook");
    }

    let handler = RpcHandler::new(hooks, collaborators, events)
        .with_max_batch_size(config.server.max_batch_size)
        .with_request_timeout(config.request_timeout());
    Ok(Arc::new(handler))
}

/// Full application router with CORS and HTTP tracing layers.
pub fn build_app(config: &ServerConfig, collaborators: Collaborators) -> Result<Router, ServerError> {
    let handler = build_handler(config, collaborators)?;
    let app = rpc_router(handler, config.session.name.clone());

    let app = if config.server.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    Ok(app.layer(TraceLayer::new_for_http()))
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    tracing::info!("Starting Companion Server");
    tracing::debug!("Configuration: {:#?}", config);

    config.validate()?;
    let addr = config.socket_addr()?;

    let collaborators = Collaborators::in_memory(config.session.config_file.clone())?;
    let app = build_app(&config, collaborators)?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("RPC server listening on http://{}", addr);
    tracing::info!("  WebSocket: ws://{}{}", addr, paths::RPC_WS);

    serve(listener, app, shutdown_signal()).await?;
    tracing::info!("Companion Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            futures::future::pending::<()>().await
        }
    }
}
