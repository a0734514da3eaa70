//! Fixed protocol constants defined by the Icecast/ICY wire format and the
//! timings the specification pins down. These should not be made
//! configurable; they are not tunables, they are wire-compatibility facts.

// ─────────────────────────────────────────────────────────────────────────────
// Source handshake
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum bytes read while looking for the end of the source request's headers.
pub const SOURCE_HANDSHAKE_MAX_BYTES: usize = 8192;

/// Receive timeout while reading the source handshake (seconds).
pub const SOURCE_HANDSHAKE_TIMEOUT_SECS: u64 = 5;

/// Chunk size used when reading an established source connection's body.
pub const SOURCE_READ_CHUNK_SIZE: usize = 8192;

/// HTTP Basic auth realm advertised in the source's `401` response.
pub const SOURCE_AUTH_REALM: &str = "Cycast";

// ─────────────────────────────────────────────────────────────────────────────
// Playlist feeder
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk size used when streaming playlist files into the ring buffer.
pub const PLAYLIST_READ_CHUNK_SIZE: usize = 8192;

/// Sleep while `source_attached` is true, between polls (milliseconds).
pub const PLAYLIST_PREEMPTION_POLL_MS: u64 = 100;

/// Sleep before retrying a ring buffer write rejected for lack of space (microseconds).
pub const PLAYLIST_WRITE_RETRY_MICROS: u64 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Broadcaster fan-out
// ─────────────────────────────────────────────────────────────────────────────

/// Per-listener outbound queue capacity, in chunks.
pub const LISTENER_QUEUE_CAPACITY: usize = 500;

/// Adaptive sleep when the ring buffer is more than 80% full (microseconds).
pub const BROADCASTER_SLEEP_HIGH_FILL_MICROS: u64 = 100;

/// Adaptive sleep when the ring buffer is more than 50% full (microseconds).
pub const BROADCASTER_SLEEP_MID_FILL_MICROS: u64 = 500;

/// Adaptive sleep otherwise, while data is available (microseconds).
pub const BROADCASTER_SLEEP_LOW_FILL_MICROS: u64 = 1000;

/// Sleep when the buffer holds less than a chunk (milliseconds).
pub const BROADCASTER_SLEEP_EMPTY_MS: u64 = 5;

/// Escalated sleep after repeated empty polls (milliseconds).
pub const BROADCASTER_SLEEP_EMPTY_ESCALATED_MS: u64 = 20;

/// Number of consecutive empty polls before escalating the sleep.
pub const BROADCASTER_EMPTY_POLL_ESCALATION_THRESHOLD: u32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Listener HTTP handler
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for a single dequeue from a listener's outbound queue (milliseconds).
///
/// Short enough that cancellation (client disconnect, server shutdown)
/// propagates promptly even while the queue is empty.
pub const LISTENER_DEQUEUE_TIMEOUT_MS: u64 = 500;

/// Bytes per unit of the ICY metadata length byte.
pub const ICY_BLOCK_SIZE: usize = 16;

// ─────────────────────────────────────────────────────────────────────────────
// Application identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in log lines and the status page footer.
pub const APP_NAME: &str = "Cycast";
