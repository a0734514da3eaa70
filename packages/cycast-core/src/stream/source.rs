//! Raw TCP ingester for live source connections (Mixxx, VLC, ffmpeg, etc.).
//!
//! Icecast's `SOURCE`/`PUT` handshake predates HTTP/1.1 request routing as
//! most libraries implement it, so this speaks the wire protocol directly
//! over a plain [`tokio::net::TcpListener`] rather than through axum.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::{
    SOURCE_AUTH_REALM, SOURCE_HANDSHAKE_MAX_BYTES, SOURCE_HANDSHAKE_TIMEOUT_SECS,
    SOURCE_READ_CHUNK_SIZE,
};
use crate::ring_buffer::RingBuffer;
use crate::stream::metadata::MetadataRegistry;

/// Tracks whether a live source is currently attached, so the playlist
/// feeder knows to yield the ring buffer.
#[derive(Default)]
pub struct SourceSlot {
    attached: AtomicBool,
    generation: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl SourceSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Claims the slot for a new source connection. If another source is
    /// already attached, its cancellation token is fired so its streaming
    /// loop returns immediately and the old TCP connection is dropped:
    /// at most one producer ever holds the ring buffer.
    fn attach(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        if let Some(old) = self.current.lock().replace(token.clone()) {
            old.cancel();
        }
        self.attached.store(true, Ordering::Release);
        (self.generation.fetch_add(1, Ordering::AcqRel) + 1, token)
    }

    /// Releases the slot, but only if `generation` is still the current
    /// holder (a newer connection may have already preempted it).
    fn detach(&self, generation: u64) {
        if self.generation.load(Ordering::Acquire) == generation {
            self.attached.store(false, Ordering::Release);
            *self.current.lock() = None;
        }
    }
}

/// Runs the source accept loop until cancelled. Intended to be spawned as
/// its own task and aborted on shutdown.
pub async fn run_source_acceptor(
    bind_host: String,
    port: u16,
    password: String,
    ring: Arc<RingBuffer>,
    metadata: Arc<MetadataRegistry>,
    source_slot: Arc<SourceSlot>,
    source_timeout_secs: u64,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((bind_host.as_str(), port)).await?;
    log::info!("source listener bound on {bind_host}:{port}");

    loop {
        let (stream, addr) = listener.accept().await?;
        log::info!("source connection from {addr}");
        let ring = Arc::clone(&ring);
        let metadata = Arc::clone(&metadata);
        let source_slot = Arc::clone(&source_slot);
        let password = password.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_source_connection(
                stream,
                &password,
                &ring,
                &metadata,
                &source_slot,
                source_timeout_secs,
            )
            .await
            {
                log::warn!("source connection from {addr} ended: {err}");
            }
        });
    }
}

async fn handle_source_connection(
    mut stream: TcpStream,
    password: &str,
    ring: &RingBuffer,
    metadata: &MetadataRegistry,
    source_slot: &SourceSlot,
    source_timeout_secs: u64,
) -> std::io::Result<()> {
    let request = match read_handshake(&mut stream).await? {
        Some(request) => request,
        None => return Ok(()),
    };

    let (method, headers) = match parse_request(&request) {
        Some(parsed) => parsed,
        None => {
            log::warn!("rejected unparseable source handshake");
            write_response(&mut stream, "405 Method Not Allowed", &[]).await?;
            return Ok(());
        }
    };

    if method != "SOURCE" && method != "PUT" {
        log::warn!("rejected source handshake with method {method}");
        write_response(&mut stream, "405 Method Not Allowed", &[]).await?;
        return Ok(());
    }

    if !authenticate(&headers, password) {
        log::warn!("source authentication failed");
        write_response(
            &mut stream,
            "401 Unauthorized",
            &[(
                "WWW-Authenticate",
                format!("Basic realm=\"{SOURCE_AUTH_REALM}\"").as_str(),
            )],
        )
        .await?;
        return Ok(());
    }

    write_response(&mut stream, "200 OK", &[]).await?;
    log::info!("source authenticated, streaming begins");

    let (generation, cancel) = source_slot.attach();
    metadata.set_title_artist(Some("Live Stream".to_string()), None);

    let result =
        stream_audio_loop(&mut stream, ring, metadata, &cancel, source_timeout_secs).await;

    source_slot.detach(generation);
    log::info!("source handler exiting");
    result
}

async fn stream_audio_loop(
    stream: &mut TcpStream,
    ring: &RingBuffer,
    metadata: &MetadataRegistry,
    cancel: &CancellationToken,
    source_timeout_secs: u64,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; SOURCE_READ_CHUNK_SIZE];
    let timeout = Duration::from_secs(source_timeout_secs);
    loop {
        let read = tokio::select! {
            read = tokio::time::timeout(timeout, stream.read(&mut buf)) => read,
            () = cancel.cancelled() => {
                log::info!("source preempted by a newer connection");
                return Ok(());
            }
        };
        let n = match read {
            Ok(Ok(0)) => {
                log::info!("source disconnected");
                return Ok(());
            }
            Ok(Ok(n)) => n,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                log::warn!("source connection timed out");
                return Ok(());
            }
        };

        let chunk = &buf[..n];
        if let Some((title, artist)) = sniff_icy_metadata(chunk) {
            metadata.set_title_artist(title, artist);
        }

        let mut offset = 0;
        while offset < n {
            if cancel.is_cancelled() {
                log::info!("source preempted while waiting for buffer space");
                return Ok(());
            }
            if ring.write(&chunk[offset..n]) {
                offset = n;
            } else {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }
}

/// Looks for an in-band `StreamTitle='...';` block within a single recv
/// chunk. Blocks split across chunk boundaries are not reassembled, matching
/// the simplified sniffing the original implementation performed.
fn sniff_icy_metadata(chunk: &[u8]) -> Option<(Option<String>, Option<String>)> {
    const NEEDLE: &[u8] = b"StreamTitle='";
    let start = find_subslice(chunk, NEEDLE)? + NEEDLE.len();
    let end = find_subslice(&chunk[start..], b"';")? + start;
    if end <= start {
        return None;
    }
    let title = String::from_utf8_lossy(&chunk[start..end]).to_string();
    if let Some((artist, track)) = title.split_once(" - ") {
        Some((Some(track.to_string()), Some(artist.to_string())))
    } else {
        Some((Some(title), None))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn read_handshake(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        if request.len() >= SOURCE_HANDSHAKE_MAX_BYTES {
            return Ok(None);
        }
        let read = tokio::time::timeout(
            Duration::from_secs(SOURCE_HANDSHAKE_TIMEOUT_SECS),
            stream.read(&mut buf),
        )
        .await;
        match read {
            Ok(Ok(0)) => return Ok(None),
            Ok(Ok(n)) => {
                request.extend_from_slice(&buf[..n]);
                if find_subslice(&request, b"\r\n\r\n").is_some() {
                    return Ok(Some(request));
                }
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => return Ok(None),
        }
    }
}

fn parse_request(request: &[u8]) -> Option<(String, Vec<(String, String)>)> {
    let text = String::from_utf8_lossy(request);
    let mut lines = text.split("\r\n");
    let request_line = lines.next()?;
    let method = request_line.split_whitespace().next()?.to_string();

    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    Some((method, headers))
}

fn authenticate(headers: &[(String, String)], password: &str) -> bool {
    let Some((_, value)) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Authorization"))
    else {
        return false;
    };

    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };

    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
        return false;
    };

    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((_user, pass)) => pass == password,
        None => false,
    }
}

async fn write_response(
    stream: &mut TcpStream,
    status_line: &str,
    extra_headers: &[(&str, &str)],
) -> std::io::Result<()> {
    let mut response = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in extra_headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    stream.write_all(response.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_parses_artist_and_title() {
        let chunk = b"xxxStreamTitle='Artist - Track';yyy";
        let (title, artist) = sniff_icy_metadata(chunk).unwrap();
        assert_eq!(title.as_deref(), Some("Track"));
        assert_eq!(artist.as_deref(), Some("Artist"));
    }

    #[test]
    fn sniff_handles_title_without_artist() {
        let chunk = b"StreamTitle='Just A Title';";
        let (title, artist) = sniff_icy_metadata(chunk).unwrap();
        assert_eq!(title.as_deref(), Some("Just A Title"));
        assert_eq!(artist, None);
    }

    #[test]
    fn sniff_returns_none_without_marker() {
        assert!(sniff_icy_metadata(b"just audio bytes").is_none());
    }

    #[test]
    fn parse_request_extracts_method_and_headers() {
        let request = b"SOURCE /stream HTTP/1.0\r\nAuthorization: Basic aGFja21l\r\nContent-Type: audio/mpeg\r\n\r\n";
        let (method, headers) = parse_request(request).unwrap();
        assert_eq!(method, "SOURCE");
        assert!(headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("Authorization")));
    }

    #[test]
    fn authenticate_accepts_matching_password() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("source:hackme");
        let headers = vec![("Authorization".to_string(), format!("Basic {encoded}"))];
        assert!(authenticate(&headers, "hackme"));
    }

    #[test]
    fn authenticate_rejects_wrong_password() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("source:wrong");
        let headers = vec![("Authorization".to_string(), format!("Basic {encoded}"))];
        assert!(!authenticate(&headers, "hackme"));
    }

    #[test]
    fn authenticate_rejects_missing_header() {
        assert!(!authenticate(&[], "hackme"));
    }

    #[test]
    fn source_slot_tracks_generation_preemption() {
        let slot = SourceSlot::new();
        assert!(!slot.is_attached());
        let (gen1, token1) = slot.attach();
        assert!(slot.is_attached());
        assert!(!token1.is_cancelled());
        let (gen2, token2) = slot.attach(); // preempt
        assert_ne!(gen1, gen2);
        assert!(token1.is_cancelled(), "preempted holder must be cancelled");
        assert!(!token2.is_cancelled());
        slot.detach(gen1); // stale handle, should not release
        assert!(slot.is_attached());
        slot.detach(gen2);
        assert!(!slot.is_attached());
    }
}
