//! Cycast Core - the Icecast-compatible audio relay's dataplane.
//!
//! This crate owns everything between a live source connection (or the
//! playlist fallback) and the listeners fanned out to over HTTP:
//!
//! - [`ring_buffer`]: the bounded circular byte buffer decoupling producer
//!   from consumers
//! - [`stream`]: the broadcaster fan-out, the source ingester, the playlist
//!   feeder, ICY framing, and the now-playing metadata registry
//! - [`status`]: the read-only snapshot consumed by the status/stats HTTP
//!   endpoints
//! - [`api`]: the axum router and shared [`api::AppState`] serving listeners
//! - [`bootstrap`]: the composition root wiring every component together
//! - [`state`]: the validated runtime [`state::Config`]
//! - [`error`]: the crate-wide error taxonomy
//!
//! The binary crate (`cycast-server`) is a thin shell: it parses CLI
//! arguments and a YAML config file, then hands a validated [`state::Config`]
//! to [`bootstrap::DataPlane::bootstrap`].

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod protocol_constants;
pub mod ring_buffer;
pub mod state;
pub mod status;
pub mod stream;
pub mod utils;

pub use api::{start_server, AppState, ServerError};
pub use bootstrap::DataPlane;
pub use error::{CycastError, CycastResult, ErrorCode};
pub use ring_buffer::RingBuffer;
pub use state::Config;
pub use stream::StreamMetadata;
