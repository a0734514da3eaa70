//! Fallback playback of local audio files when no live source is attached.
//!
//! Scans a directory for matching extensions, optionally shuffles the
//! order, and loops the list forever, yielding the ring buffer as soon as a
//! live source attaches and resuming once it detaches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::io::AsyncReadExt;

use crate::protocol_constants::{
    PLAYLIST_PREEMPTION_POLL_MS, PLAYLIST_READ_CHUNK_SIZE, PLAYLIST_WRITE_RETRY_MICROS,
};
use crate::ring_buffer::RingBuffer;
use crate::stream::metadata::MetadataRegistry;
use crate::stream::source::SourceSlot;

/// Scans `directory` for files whose lowercased extension matches one of
/// `extensions` (each including the leading dot), optionally shuffled.
#[must_use]
pub fn load_playlist(directory: &str, extensions: &[String], shuffle: bool) -> Vec<PathBuf> {
    let dir = Path::new(directory);
    let Ok(entries) = std::fs::read_dir(dir) else {
        log::info!("playlist directory {directory} not found");
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = format!(".{}", ext.to_lowercase());
                        extensions.iter().any(|wanted| wanted.to_lowercase() == ext)
                    })
                    .unwrap_or(false)
        })
        .collect();

    if shuffle {
        files.shuffle(&mut rand::thread_rng());
    } else {
        files.sort();
    }

    if files.is_empty() {
        log::info!("no audio files found in playlist directory {directory}");
    } else {
        log::info!("loaded {} files into playlist", files.len());
    }

    files
}

/// Runs the playlist feeder loop forever. Intended to be spawned as its own
/// task. Returns if `files` is empty, since there's nothing to loop over.
pub async fn run_playlist_feeder(
    files: Vec<PathBuf>,
    ring: Arc<RingBuffer>,
    metadata: Arc<MetadataRegistry>,
    source_slot: Arc<SourceSlot>,
) {
    if files.is_empty() {
        return;
    }

    let mut index = 0usize;
    let mut was_active = false;

    loop {
        if source_slot.is_attached() {
            if was_active {
                log::info!("live source connected, stopping playlist");
                was_active = false;
            }
            tokio::time::sleep(Duration::from_millis(PLAYLIST_PREEMPTION_POLL_MS)).await;
            continue;
        }

        if !was_active {
            log::info!("no source connected, starting playlist fallback");
            was_active = true;
        }

        let path = &files[index];
        if let Err(err) = play_file(path, &ring, &metadata, &source_slot).await {
            log::error!("error playing {}: {err}", path.display());
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        index = (index + 1) % files.len();
    }
}

async fn play_file(
    path: &Path,
    ring: &RingBuffer,
    metadata: &MetadataRegistry,
    source_slot: &SourceSlot,
) -> std::io::Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown")
        .to_string();

    metadata.set_title_artist(Some(filename.clone()), Some("Playlist".to_string()));
    log::info!("playing from playlist: {filename}");

    let mut file = tokio::fs::File::open(path).await?;
    skip_id3v2_header(&mut file).await?;

    let mut buf = vec![0u8; PLAYLIST_READ_CHUNK_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        if source_slot.is_attached() {
            log::info!("live source connected, stopping playlist");
            break;
        }

        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let mut offset = 0;
        while offset < n {
            if source_slot.is_attached() {
                break;
            }
            if ring.write(&buf[offset..n]) {
                offset = n;
            } else {
                tokio::time::sleep(Duration::from_micros(PLAYLIST_WRITE_RETRY_MICROS)).await;
            }
        }
        bytes_written += offset as u64;
    }

    log::info!("finished playing {filename} ({bytes_written} bytes)");
    Ok(())
}

/// Skips a leading ID3v2 tag, if present, by decoding its synchsafe 28-bit
/// size field (7 usable bits per byte across 4 bytes).
async fn skip_id3v2_header(file: &mut tokio::fs::File) -> std::io::Result<()> {
    use tokio::io::AsyncSeekExt;

    let mut header = [0u8; 10];
    let n = file.read(&mut header).await?;
    if n == 10 && &header[0..3] == b"ID3" {
        let size = ((u32::from(header[6] & 0x7f)) << 21)
            | ((u32::from(header[7] & 0x7f)) << 14)
            | ((u32::from(header[8] & 0x7f)) << 7)
            | u32::from(header[9] & 0x7f);
        file.seek(std::io::SeekFrom::Start(u64::from(size) + 10))
            .await?;
    } else {
        file.seek(std::io::SeekFrom::Start(0)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_playlist_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"data").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"data").unwrap();
        std::fs::write(dir.path().join("c.ogg"), b"data").unwrap();

        let files = load_playlist(
            dir.path().to_str().unwrap(),
            &[".mp3".to_string(), ".ogg".to_string()],
            false,
        );
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn load_playlist_missing_directory_returns_empty() {
        let files = load_playlist("/no/such/directory", &[".mp3".to_string()], false);
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn skip_id3v2_header_seeks_past_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.mp3");
        let mut header = vec![b'I', b'D', b'3', 3, 0, 0];
        // synchsafe size of 20 bytes of tag payload
        header.extend_from_slice(&[0, 0, 0, 20]);
        let mut content = header;
        content.extend(vec![0u8; 20]); // tag payload
        content.extend_from_slice(b"AUDIO");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&content).unwrap();
        drop(f);

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        skip_id3v2_header(&mut file).await.unwrap();
        let mut rest = Vec::new();
        file.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"AUDIO");
    }

    #[tokio::test]
    async fn skip_id3v2_header_no_tag_seeks_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untagged.mp3");
        std::fs::write(&path, b"RAWAUDIO").unwrap();

        let mut file = tokio::fs::File::open(&path).await.unwrap();
        skip_id3v2_header(&mut file).await.unwrap();
        let mut rest = Vec::new();
        file.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"RAWAUDIO");
    }
}
