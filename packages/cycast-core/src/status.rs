//! Pure read-model over the data plane's live state, used by both the JSON
//! status endpoint and the HTML status page.

use serde::Serialize;

use crate::ring_buffer::RingBuffer;
use crate::stream::broadcaster::Broadcaster;
use crate::stream::metadata::MetadataRegistry;
use crate::stream::source::SourceSlot;

/// Buffer occupancy, as reported in the status snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BufferStatus {
    pub available_bytes: usize,
    pub space_bytes: usize,
    pub fill_percentage: f64,
}

/// Now-playing metadata, as reported in the status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataStatus {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub display: Option<String>,
}

/// Full snapshot of dataplane state for `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub source_connected: bool,
    pub listeners: usize,
    pub uptime_seconds: u64,
    pub metadata: MetadataStatus,
    pub buffer: BufferStatus,
}

/// Builds a [`StatusSnapshot`] from the live components. Takes no lock for
/// longer than reading a single field; this is a point-in-time read, not a
/// transaction.
#[must_use]
pub fn snapshot(
    ring: &RingBuffer,
    broadcaster: &Broadcaster,
    metadata: &MetadataRegistry,
    source_slot: &SourceSlot,
    started_at_secs: u64,
    now_secs: u64,
) -> StatusSnapshot {
    let current = metadata.get();
    let display = current.display();

    StatusSnapshot {
        source_connected: source_slot.is_attached(),
        listeners: broadcaster.listener_count(),
        uptime_seconds: now_secs.saturating_sub(started_at_secs),
        metadata: MetadataStatus {
            title: current.title,
            artist: current.artist,
            display,
        },
        buffer: BufferStatus {
            available_bytes: ring.available(),
            space_bytes: ring.space(),
            fill_percentage: ring.fill_fraction() * 100.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn snapshot_reflects_component_state() {
        let ring = RingBuffer::new(1000);
        ring.write(&[0u8; 500]);
        let broadcaster = Broadcaster::new(Arc::new(RingBuffer::new(100)), 16);
        let metadata = MetadataRegistry::new();
        metadata.set_title_artist(Some("Track".to_string()), Some("Artist".to_string()));
        let source_slot = SourceSlot::new();

        let snap = snapshot(&ring, &broadcaster, &metadata, &source_slot, 1000, 1010);

        assert!(!snap.source_connected);
        assert_eq!(snap.listeners, 0);
        assert_eq!(snap.uptime_seconds, 10);
        assert_eq!(snap.metadata.title.as_deref(), Some("Track"));
        assert_eq!(snap.buffer.available_bytes, 500);
    }
}
