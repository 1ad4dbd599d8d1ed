//! Top-level server: wires configuration, store, chain log, and the router
//! together, and owns the bind/serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::chainlink::ChainLog;
use crate::config::{Keys, ServerConfig};
use crate::store::Store;

/// Shared, read-only (after startup) context every handler is given.
pub struct SharedState {
    pub store: Store,
    pub chain: ChainLog,
    pub keys: Keys,
    pub base_url: String,
    pub test_mode: bool,
}

pub struct Server {
    config: ServerConfig,
    state: Arc<SharedState>,
}

impl Server {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let keys = Keys::load(&config.keys_file)?;
        let store = Store::open(&config.db_path).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let chain = ChainLog::open(&config.db_path, config.chainlink_error_log.clone())
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let state = Arc::new(SharedState {
            store,
            chain,
            base_url: config.base_url.clone(),
            test_mode: config.test_mode,
            keys,
        });
        Ok(Self { config, state })
    }

    /// Build a server from an already-constructed state, for tests.
    pub fn with_state(config: ServerConfig, state: Arc<SharedState>) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        crate::api::router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(tower::timeout::TimeoutLayer::new(Duration::from_secs(60)))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.config.bind_addr.parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "didserver listening");
        let app = self.router();
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
