//! Composition root: wires the ring buffer, broadcaster, metadata registry,
//! source slot, and playlist feeder into a single [`DataPlane`] handle.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::{CycastError, CycastResult};
use crate::ring_buffer::RingBuffer;
use crate::state::Config;
use crate::stream::broadcaster::Broadcaster;
use crate::stream::metadata::MetadataRegistry;
use crate::stream::playlist;
use crate::stream::source::{self, SourceSlot};
use crate::utils::now_millis;

/// Owns every long-lived component of the audio data plane and the
/// background tasks driving them.
pub struct DataPlane {
    pub config: Config,
    pub ring: Arc<RingBuffer>,
    pub broadcaster: Arc<Broadcaster>,
    pub metadata: Arc<MetadataRegistry>,
    pub source_slot: Arc<SourceSlot>,
    pub started_at_millis: u64,
    source_task: JoinHandle<std::io::Result<()>>,
    playlist_task: Option<JoinHandle<()>>,
}

impl DataPlane {
    /// Validates `config`, builds every component, and spawns the source
    /// acceptor, the broadcaster loop, and (if a playlist is found) the
    /// fallback feeder.
    pub async fn bootstrap(config: Config) -> CycastResult<Self> {
        config
            .validate()
            .map_err(CycastError::Config)?;

        let ring = Arc::new(RingBuffer::new(config.buffer_size_bytes));
        let broadcaster = Broadcaster::new(Arc::clone(&ring), config.chunk_size);
        broadcaster.start();

        let metadata = Arc::new(MetadataRegistry::new());
        metadata.set_title_artist(Some(config.station_name.clone()), None);

        let source_slot = Arc::new(SourceSlot::new());

        let source_task = tokio::spawn(source::run_source_acceptor(
            config.bind_host.clone(),
            config.source_port,
            config.source_password.clone(),
            Arc::clone(&ring),
            Arc::clone(&metadata),
            Arc::clone(&source_slot),
            config.source_timeout_secs,
        ));

        let files = playlist::load_playlist(
            &config.playlist_directory,
            &config.playlist_extensions,
            config.playlist_shuffle,
        );

        let playlist_task = if files.is_empty() {
            log::info!("no playlist configured - will only stream from live sources");
            None
        } else {
            log::info!("playlist loaded: {} tracks", files.len());
            Some(tokio::spawn(playlist::run_playlist_feeder(
                files,
                Arc::clone(&ring),
                Arc::clone(&metadata),
                Arc::clone(&source_slot),
            )))
        };

        Ok(Self {
            config,
            ring,
            broadcaster,
            metadata,
            source_slot,
            started_at_millis: now_millis(),
            source_task,
            playlist_task,
        })
    }

    /// Stops every background task. Best-effort: the source acceptor and
    /// playlist feeder are aborted since neither has meaningful
    /// in-flight-write state to flush, while the broadcaster is given a
    /// chance to drain its loop and close listener queues cleanly.
    pub async fn shutdown(&mut self) {
        self.source_task.abort();
        if let Some(task) = self.playlist_task.take() {
            task.abort();
        }
        self.broadcaster.stop().await;
    }
}
