//! Shared now-playing metadata registry.
//!
//! A single `RwLock`-guarded snapshot, written by whichever of the source
//! ingester or the playlist feeder currently holds the ring buffer, and read
//! by every listener's ICY injector and the status endpoint.

use parking_lot::RwLock;

use super::StreamMetadata;

/// Thread-safe holder for the current track's title/artist.
pub struct MetadataRegistry {
    current: RwLock<StreamMetadata>,
}

impl MetadataRegistry {
    /// Creates a registry with no metadata set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(StreamMetadata::default()),
        }
    }

    /// Returns a clone of the current metadata snapshot.
    #[must_use]
    pub fn get(&self) -> StreamMetadata {
        self.current.read().clone()
    }

    /// Replaces the current metadata wholesale.
    pub fn set(&self, metadata: StreamMetadata) {
        *self.current.write() = metadata;
    }

    /// Convenience for the common case of setting both fields from the
    /// source's ICY sniff or the playlist feeder's filename fallback.
    pub fn set_title_artist(&self, title: Option<String>, artist: Option<String>) {
        self.set(StreamMetadata { title, artist });
    }

    /// Clears the current metadata (used when the source disconnects and no
    /// playlist feeder has started yet).
    pub fn clear(&self) {
        self.set(StreamMetadata::default());
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let registry = MetadataRegistry::new();
        assert_eq!(registry.get(), StreamMetadata::default());
    }

    #[test]
    fn set_then_get_round_trips() {
        let registry = MetadataRegistry::new();
        registry.set_title_artist(Some("Song".to_string()), Some("Artist".to_string()));
        let snapshot = registry.get();
        assert_eq!(snapshot.title.as_deref(), Some("Song"));
        assert_eq!(snapshot.artist.as_deref(), Some("Artist"));
    }

    #[test]
    fn clear_resets_to_default() {
        let registry = MetadataRegistry::new();
        registry.set_title_artist(Some("Song".to_string()), None);
        registry.clear();
        assert_eq!(registry.get(), StreamMetadata::default());
    }

    #[test]
    fn display_formats_artist_and_title() {
        let registry = MetadataRegistry::new();
        registry.set_title_artist(Some("Song".to_string()), Some("Artist".to_string()));
        assert_eq!(registry.get().display().as_deref(), Some("Artist - Song"));
    }
}
