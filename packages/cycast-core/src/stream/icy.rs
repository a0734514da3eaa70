//! ICY (Shoutcast) protocol metadata handling.
//!
//! This module encapsulates ICY metadata formatting and injection,
//! keeping protocol-specific concerns separate from the broadcaster loop.

use bytes::{Bytes, BytesMut};

use crate::protocol_constants::ICY_BLOCK_SIZE;

use super::StreamMetadata;

/// Formats stream metadata into ICY protocol format.
///
/// This struct provides stateless metadata formatting according to the
/// ICY/Shoutcast protocol specification.
pub struct IcyFormatter;

impl IcyFormatter {
    /// Formats metadata into an ICY metadata block.
    ///
    /// Per ICY spec, a single zero byte indicates no metadata change.
    /// Otherwise, the first byte is the number of 16-byte blocks, followed
    /// by the metadata string padded to that length.
    #[must_use]
    pub fn format_metadata(metadata: &StreamMetadata) -> Vec<u8> {
        let Some(title) = metadata.display() else {
            log::debug!("[ICY] no title/artist in metadata, sending empty block");
            return vec![0];
        };

        if title.is_empty() {
            return vec![0];
        }

        // ICY metadata uses single quotes as delimiters. Replace with the
        // Unicode RIGHT SINGLE QUOTATION MARK (U+2019), which looks identical
        // to clients, rather than backslash-escaping.
        let title = title.replace('\'', "\u{2019}");
        let meta_str = format!("StreamTitle='{title}';");
        let meta_bytes = meta_str.as_bytes();

        let num_blocks = meta_bytes.len().div_ceil(ICY_BLOCK_SIZE);
        let padded_len = num_blocks * ICY_BLOCK_SIZE;

        let mut result = Vec::with_capacity(padded_len + 1);
        result.push(num_blocks as u8);
        result.extend_from_slice(meta_bytes);
        result.resize(padded_len + 1, 0);

        result
    }
}

/// Stateful injector for ICY metadata blocks into a single listener's audio
/// stream.
///
/// Tracks byte position to insert metadata at `meta_interval` boundaries.
/// Per the ICY convention, the full `StreamTitle='…';` block is only ever
/// emitted once, the first interval boundary crossed after the title/artist
/// actually changes; every interval after that until the next change emits
/// the one-byte `L=0` "no change" marker instead of re-sending the block.
///
/// One instance per listener connection.
pub struct IcyMetadataInjector {
    meta_interval: usize,
    bytes_since_meta: usize,
    full_block: Vec<u8>,
    pending_emit: bool,
    last_artist: Option<String>,
    last_title: Option<String>,
    output_buffer: BytesMut,
}

/// The one-byte "no metadata change" marker (`L=0`, no payload).
const NO_CHANGE_BLOCK: [u8; 1] = [0];

impl IcyMetadataInjector {
    /// Creates a new injector inserting a metadata block every
    /// `meta_interval` bytes of audio.
    #[must_use]
    pub fn new(meta_interval: usize) -> Self {
        Self {
            meta_interval: meta_interval.max(1),
            bytes_since_meta: 0,
            full_block: vec![0],
            pending_emit: false,
            last_artist: None,
            last_title: None,
            output_buffer: BytesMut::new(),
        }
    }

    /// The configured interval, for use by the handler when it needs to
    /// advertise `icy-metaint` in the response headers.
    #[must_use]
    pub fn meta_interval(&self) -> usize {
        self.meta_interval
    }

    /// Reformats and caches the full block if `metadata` differs from what
    /// was last cached, and marks that the next interval boundary should
    /// emit it (rather than the `L=0` marker).
    fn update_metadata_cache(&mut self, metadata: &StreamMetadata) {
        if self.last_artist != metadata.artist || self.last_title != metadata.title {
            self.full_block = IcyFormatter::format_metadata(metadata);
            self.last_artist = metadata.artist.clone();
            self.last_title = metadata.title.clone();
            self.pending_emit = true;
        }
    }

    /// Injects ICY metadata blocks into an audio chunk at the configured
    /// interval, returning the chunk with blocks interleaved.
    pub fn inject(&mut self, chunk: &[u8], metadata: &StreamMetadata) -> Bytes {
        self.update_metadata_cache(metadata);

        let total_bytes = self.bytes_since_meta + chunk.len();
        let num_insertions = total_bytes / self.meta_interval;
        let required_capacity = chunk.len() + num_insertions * self.full_block.len();
        self.output_buffer.reserve(required_capacity);

        let mut remaining = chunk;

        while !remaining.is_empty() {
            let bytes_to_meta = self.meta_interval - self.bytes_since_meta;

            if remaining.len() < bytes_to_meta {
                self.output_buffer.extend_from_slice(remaining);
                self.bytes_since_meta += remaining.len();
                break;
            }

            self.output_buffer
                .extend_from_slice(&remaining[..bytes_to_meta]);
            if self.pending_emit {
                self.output_buffer.extend_from_slice(&self.full_block);
                self.pending_emit = false;
            } else {
                self.output_buffer.extend_from_slice(&NO_CHANGE_BLOCK);
            }
            remaining = &remaining[bytes_to_meta..];
            self.bytes_since_meta = 0;
        }

        self.output_buffer.split().freeze()
    }

    /// Returns the current byte count since the last metadata block.
    #[must_use]
    #[allow(dead_code)] // exercised in tests
    pub fn bytes_since_meta(&self) -> usize {
        self.bytes_since_meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METAINT: usize = 16000;

    #[test]
    fn empty_metadata_returns_zero_byte() {
        let metadata = StreamMetadata::default();
        let result = IcyFormatter::format_metadata(&metadata);
        assert_eq!(result, vec![0]);
    }

    #[test]
    fn title_only_formats_correctly() {
        let metadata = StreamMetadata {
            title: Some("Test Song".to_string()),
            artist: None,
        };
        let result = IcyFormatter::format_metadata(&metadata);
        assert_eq!(result[0], 2); // two 16-byte blocks for "StreamTitle='Test Song';"
        assert_eq!(result.len(), 33); // 1 length byte + 32 data bytes
    }

    #[test]
    fn artist_and_title_formats_with_separator() {
        let metadata = StreamMetadata {
            title: Some("Song".to_string()),
            artist: Some("Artist".to_string()),
        };
        let result = IcyFormatter::format_metadata(&metadata);
        let content = String::from_utf8_lossy(&result[1..]);
        assert!(content.contains("Artist - Song"));
    }

    #[test]
    fn single_quotes_are_replaced_with_unicode() {
        let metadata = StreamMetadata {
            title: Some("It's a Test".to_string()),
            artist: None,
        };
        let result = IcyFormatter::format_metadata(&metadata);
        let content = String::from_utf8_lossy(&result[1..]);
        assert!(content.contains("It\u{2019}s a Test"));
        assert!(!content.contains("It\u{0027}s a Test"));
    }

    #[test]
    fn injector_tracks_byte_position() {
        let mut injector = IcyMetadataInjector::new(METAINT);
        let metadata = StreamMetadata::default();

        let chunk = vec![0u8; 1000];
        let result = injector.inject(&chunk, &metadata);

        assert_eq!(result.len(), 1000);
        assert_eq!(injector.bytes_since_meta(), 1000);
    }

    #[test]
    fn injector_inserts_metadata_at_boundary() {
        let mut injector = IcyMetadataInjector::new(METAINT);
        let metadata = StreamMetadata::default();

        let chunk = vec![0u8; METAINT];
        let result = injector.inject(&chunk, &metadata);

        assert_eq!(result.len(), METAINT + 1);
        assert_eq!(result[METAINT], 0);
        assert_eq!(injector.bytes_since_meta(), 0);
    }

    #[test]
    fn injector_handles_multiple_boundaries() {
        let mut injector = IcyMetadataInjector::new(METAINT);
        let metadata = StreamMetadata::default();

        let chunk = vec![0u8; METAINT * 2 + METAINT / 2];
        let result = injector.inject(&chunk, &metadata);

        assert_eq!(result.len(), METAINT * 2 + METAINT / 2 + 2);
        assert_eq!(injector.bytes_since_meta(), METAINT / 2);
    }

    #[test]
    fn injector_emits_full_block_once_then_zero_until_next_change() {
        let mut injector = IcyMetadataInjector::new(METAINT);

        let metadata1 = StreamMetadata {
            title: Some("Song A".to_string()),
            artist: Some("Artist".to_string()),
        };

        let chunk = vec![0u8; METAINT];

        // First interval after the title changes: emit the full block.
        let result1 = injector.inject(&chunk, &metadata1);
        let meta_block_1: Vec<u8> = result1[METAINT..].to_vec();
        assert!(meta_block_1.len() > 1, "first emission should be the full block");
        let content1 = String::from_utf8_lossy(&meta_block_1[1..]);
        assert!(content1.contains("Artist - Song A"));

        // Same metadata again: subsequent intervals emit L=0 until it changes.
        let result2 = injector.inject(&chunk, &metadata1);
        let meta_block_2: Vec<u8> = result2[METAINT..].to_vec();
        assert_eq!(
            meta_block_2,
            vec![0],
            "unchanged metadata should emit the L=0 marker, not the block again"
        );

        let metadata2 = StreamMetadata {
            title: Some("Song B".to_string()),
            artist: Some("Artist".to_string()),
        };

        // New metadata: the next interval emits the full block again.
        let result3 = injector.inject(&chunk, &metadata2);
        let meta_block_3: Vec<u8> = result3[METAINT..].to_vec();
        assert_ne!(
            meta_block_3,
            vec![0],
            "a metadata change should emit the full block, not L=0"
        );
        let content3 = String::from_utf8_lossy(&meta_block_3[1..]);
        assert!(content3.contains("Song B"));
    }
}
