//! HTTP API layer: shared application state and server startup.
//!
//! Handlers are thin: they read from [`AppState`]'s `Arc`-shared components
//! and delegate the actual work to the `stream` and `status` modules.

use std::sync::Arc;

use thiserror::Error;

use crate::bootstrap::DataPlane;
use crate::ring_buffer::RingBuffer;
use crate::state::Config;
use crate::stream::broadcaster::Broadcaster;
use crate::stream::metadata::MetadataRegistry;
use crate::stream::source::SourceSlot;

pub mod http;

/// Errors that can occur when starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the listener-facing HTTP API.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ring: Arc<RingBuffer>,
    pub broadcaster: Arc<Broadcaster>,
    pub metadata: Arc<MetadataRegistry>,
    pub source_slot: Arc<SourceSlot>,
    pub started_at_millis: u64,
}

impl AppState {
    /// Derives the state handed to axum handlers from a running `DataPlane`.
    #[must_use]
    pub fn from_data_plane(data_plane: &DataPlane) -> Self {
        Self {
            config: Arc::new(data_plane.config.clone()),
            ring: Arc::clone(&data_plane.ring),
            broadcaster: Arc::clone(&data_plane.broadcaster),
            metadata: Arc::clone(&data_plane.metadata),
            source_slot: Arc::clone(&data_plane.source_slot),
            started_at_millis: data_plane.started_at_millis,
        }
    }
}

/// Binds and serves the listener HTTP API on `state.config`'s `listen_port`.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let addr = std::net::SocketAddr::from((
        state
            .config
            .bind_host
            .parse::<std::net::IpAddr>()
            .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
        state.config.listen_port,
    ));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listener HTTP server listening on http://{addr}");

    let app = http::create_router(state);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
