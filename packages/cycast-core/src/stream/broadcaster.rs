//! Fan-out of the ring buffer's byte stream to many listeners.
//!
//! A single background task pulls fixed-size chunks out of the
//! [`RingBuffer`](crate::ring_buffer::RingBuffer) and pushes a clone of each
//! chunk onto every connected listener's outbound queue. Each listener's
//! queue is bounded and drops its oldest entry on overflow rather than
//! blocking the fan-out loop or disconnecting the listener: a slow listener
//! falls behind and hears a skip, it does not stall the broadcast.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::protocol_constants::{
    BROADCASTER_EMPTY_POLL_ESCALATION_THRESHOLD, BROADCASTER_SLEEP_EMPTY_ESCALATED_MS,
    BROADCASTER_SLEEP_EMPTY_MS, BROADCASTER_SLEEP_HIGH_FILL_MICROS,
    BROADCASTER_SLEEP_LOW_FILL_MICROS, BROADCASTER_SLEEP_MID_FILL_MICROS,
    LISTENER_QUEUE_CAPACITY,
};
use crate::ring_buffer::RingBuffer;

/// Bounded, drop-oldest outbound queue for a single listener.
struct ListenerQueue {
    inner: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl ListenerQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Pushes a chunk, dropping the oldest queued chunk if already at capacity.
    fn enqueue(&self, chunk: Bytes) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(chunk);
        drop(queue);
        self.notify.notify_one();
    }

    /// Waits up to `timeout` for a chunk, returning `None` on timeout or once closed.
    async fn dequeue_timeout(&self, timeout: Duration) -> Option<Bytes> {
        loop {
            if let Some(chunk) = self.inner.lock().pop_front() {
                return Some(chunk);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if tokio::time::timeout(timeout, self.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A single connected listener's handle into the broadcaster.
pub struct Listener {
    id: u64,
    queue: ListenerQueue,
    bytes_sent: AtomicU64,
    connected_at: Instant,
}

impl Listener {
    /// Opaque identifier, unique for the lifetime of the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next chunk of audio destined for this listener.
    pub async fn recv(&self, timeout: Duration) -> Option<Bytes> {
        let chunk = self.queue.dequeue_timeout(timeout).await?;
        self.bytes_sent
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        Some(chunk)
    }

    /// Total bytes handed to this listener so far.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// How long this listener has been connected.
    #[must_use]
    pub fn connected_secs(&self) -> u64 {
        self.connected_at.elapsed().as_secs()
    }

    /// Whether this listener's queue has been closed (removed from the
    /// broadcaster, or the broadcaster has stopped). A handler should stop
    /// streaming once this is true.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Per-listener detail reported by `GET /api/stats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ListenerStats {
    pub id: u64,
    pub bytes_sent: u64,
    pub connected_seconds: u64,
}

/// Aggregate broadcaster state, reported by the status/stats endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BroadcasterStats {
    pub total_listeners: usize,
    pub listeners: Vec<ListenerStats>,
    pub total_bytes_sent: u64,
}

/// Pulls audio out of the ring buffer and fans it out to listeners.
pub struct Broadcaster {
    ring: Arc<RingBuffer>,
    listeners: DashMap<u64, Arc<Listener>>,
    next_id: AtomicU64,
    chunk_size: usize,
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    total_bytes_sent: AtomicU64,
}

impl Broadcaster {
    /// Creates a broadcaster reading from `ring` in `chunk_size`-byte pulls.
    #[must_use]
    pub fn new(ring: Arc<RingBuffer>, chunk_size: usize) -> Arc<Self> {
        Arc::new(Self {
            ring,
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            chunk_size,
            running: AtomicBool::new(false),
            task: Mutex::new(None),
            total_bytes_sent: AtomicU64::new(0),
        })
    }

    /// Spawns the background fan-out loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.task.lock() = Some(handle);
    }

    /// Stops the fan-out loop and disconnects every listener.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        for entry in self.listeners.iter() {
            let listener = entry.value();
            listener.queue.close();
            self.total_bytes_sent
                .fetch_add(listener.bytes_sent(), Ordering::Relaxed);
        }
        self.listeners.clear();
    }

    /// Registers a new listener and returns its handle.
    pub fn add_listener(&self) -> Arc<Listener> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            id,
            queue: ListenerQueue::new(LISTENER_QUEUE_CAPACITY),
            bytes_sent: AtomicU64::new(0),
            connected_at: Instant::now(),
        });
        self.listeners.insert(id, Arc::clone(&listener));
        listener
    }

    /// Removes a listener, typically called when its HTTP connection closes.
    pub fn remove_listener(&self, id: u64) {
        if let Some((_, listener)) = self.listeners.remove(&id) {
            listener.queue.close();
            self.total_bytes_sent
                .fetch_add(listener.bytes_sent(), Ordering::Relaxed);
        }
    }

    /// Current number of connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether a listener with the given id is still registered.
    #[must_use]
    pub fn is_listener_active(&self, id: u64) -> bool {
        self.listeners.contains_key(&id)
    }

    /// Snapshot of broadcaster-wide stats for the `/api/stats` endpoint.
    /// `total_bytes_sent` accumulates bytes sent by listeners that have
    /// since disconnected, plus bytes sent so far by those still connected.
    #[must_use]
    pub fn stats(&self) -> BroadcasterStats {
        let listeners: Vec<ListenerStats> = self
            .listeners
            .iter()
            .map(|entry| {
                let listener = entry.value();
                ListenerStats {
                    id: listener.id(),
                    bytes_sent: listener.bytes_sent(),
                    connected_seconds: listener.connected_secs(),
                }
            })
            .collect();

        let live_bytes_sent: u64 = listeners.iter().map(|l| l.bytes_sent).sum();

        BroadcasterStats {
            total_listeners: listeners.len(),
            listeners,
            total_bytes_sent: self.total_bytes_sent.load(Ordering::Relaxed) + live_bytes_sent,
        }
    }

    async fn run(&self) {
        let mut empty_polls: u32 = 0;

        while self.running.load(Ordering::Acquire) {
            let available = self.ring.available();

            if available < self.chunk_size {
                empty_polls = empty_polls.saturating_add(1);
                let sleep_ms = if empty_polls > BROADCASTER_EMPTY_POLL_ESCALATION_THRESHOLD {
                    BROADCASTER_SLEEP_EMPTY_ESCALATED_MS
                } else {
                    BROADCASTER_SLEEP_EMPTY_MS
                };
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                continue;
            }
            empty_polls = 0;

            let chunk = self.ring.read(self.chunk_size);
            if !chunk.is_empty() {
                let bytes = Bytes::from(chunk);
                for entry in self.listeners.iter() {
                    entry.value().queue.enqueue(bytes.clone());
                }
            }

            let fill = self.ring.fill_fraction();
            let sleep = if fill > 0.8 {
                Duration::from_micros(BROADCASTER_SLEEP_HIGH_FILL_MICROS)
            } else if fill > 0.5 {
                Duration::from_micros(BROADCASTER_SLEEP_MID_FILL_MICROS)
            } else {
                Duration::from_micros(BROADCASTER_SLEEP_LOW_FILL_MICROS)
            };
            tokio::time::sleep(sleep).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_queue_drops_oldest_when_full() {
        let queue = ListenerQueue::new(2);
        queue.enqueue(Bytes::from_static(b"a"));
        queue.enqueue(Bytes::from_static(b"b"));
        queue.enqueue(Bytes::from_static(b"c"));
        let mut drained = Vec::new();
        while let Some(chunk) = queue.inner.lock().pop_front() {
            drained.push(chunk);
        }
        assert_eq!(drained, vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")]);
    }

    #[tokio::test]
    async fn add_and_remove_listener_updates_count() {
        let ring = Arc::new(RingBuffer::new(1024));
        let broadcaster = Broadcaster::new(ring, 64);
        let listener = broadcaster.add_listener();
        assert_eq!(broadcaster.listener_count(), 1);
        broadcaster.remove_listener(listener.id());
        assert_eq!(broadcaster.listener_count(), 0);
    }

    #[tokio::test]
    async fn broadcaster_delivers_chunks_to_listener() {
        let ring = Arc::new(RingBuffer::new(1024));
        let broadcaster = Broadcaster::new(ring.clone(), 16);
        let listener = broadcaster.add_listener();
        broadcaster.start();

        ring.write(&[1u8; 16]);

        let chunk = listener.recv(Duration::from_secs(1)).await;
        assert_eq!(chunk.as_deref(), Some(&[1u8; 16][..]));

        broadcaster.stop().await;
    }

    #[tokio::test]
    async fn dequeue_times_out_when_empty() {
        let queue = ListenerQueue::new(4);
        let result = queue.dequeue_timeout(Duration::from_millis(20)).await;
        assert!(result.is_none());
    }
}
