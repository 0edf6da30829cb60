//! Append-only attention log shared between the attention monitor and the
//! interaction logic.
//!
//! The log lives for the whole session and is never truncated.  Writes go
//! through an [`AttentionWriter`]; [`AttentionLog::writer`] hands out at most
//! one writer at a time, so the background monitor is the only task that can
//! append while an interaction runs.
//!
//! # Example
//!
//! ```rust
//! use docent_memory::attention_log::AttentionLog;
//! use docent_types::AttentionSample;
//!
//! let log = AttentionLog::new();
//! let writer = log.writer().expect("no other writer");
//! assert!(log.writer().is_none());
//!
//! writer.append(AttentionSample::now(0.1, 0.8));
//! assert_eq!(log.len(), 1);
//!
//! drop(writer);
//! assert!(log.writer().is_some());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use docent_types::AttentionSample;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct Shared {
    samples: RwLock<Vec<AttentionSample>>,
    writer_active: AtomicBool,
}

/// Read handle to the session attention log.  Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct AttentionLog {
    shared: Arc<Shared>,
}

impl AttentionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single write handle.  Returns `None` while another writer is
    /// alive.
    pub fn writer(&self) -> Option<AttentionWriter> {
        self.shared
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AttentionWriter {
                shared: Arc::clone(&self.shared),
            })
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<AttentionSample> {
        self.shared.samples.read().last().copied()
    }

    pub fn len(&self) -> usize {
        self.shared.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.samples.read().is_empty()
    }

    /// Copy of every sample recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<AttentionSample> {
        self.shared.samples.read().clone()
    }

    /// Copy of the samples recorded at or after position `start`.
    pub fn since(&self, start: usize) -> Vec<AttentionSample> {
        let samples = self.shared.samples.read();
        samples.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

/// Exclusive append handle.  Releases the writer slot on drop.
#[derive(Debug)]
pub struct AttentionWriter {
    shared: Arc<Shared>,
}

impl AttentionWriter {
    /// Append a sample and return the new length of the log.
    pub fn append(&self, sample: AttentionSample) -> usize {
        let mut samples = self.shared.samples.write();
        samples.push(sample);
        samples.len()
    }
}

impl Drop for AttentionWriter {
    fn drop(&mut self) {
        self.shared.writer_active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_log_has_no_latest() {
        let log = AttentionLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
    }

    #[test]
    fn latest_tracks_last_append() {
        let log = AttentionLog::new();
        let w = log.writer().unwrap();
        w.append(AttentionSample::now(0.0, 0.2));
        assert_eq!(w.append(AttentionSample::now(0.0, 0.9)), 2);
        let latest = log.latest().unwrap();
        assert!((latest.attention - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn only_one_writer_at_a_time() {
        let log = AttentionLog::new();
        let first = log.writer();
        assert!(first.is_some());
        assert!(log.clone().writer().is_none());
        drop(first);
        assert!(log.writer().is_some());
    }

    #[test]
    fn since_returns_tail() {
        let log = AttentionLog::new();
        let w = log.writer().unwrap();
        for a in [0.1, 0.2, 0.3] {
            w.append(AttentionSample::now(0.0, a));
        }
        assert_eq!(log.since(1).len(), 2);
        assert!(log.since(3).is_empty());
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn readers_observe_writer_thread() {
        let log = AttentionLog::new();
        let w = log.writer().unwrap();
        let handle = thread::spawn(move || {
            for i in 0..100 {
                w.append(AttentionSample::now(0.0, i as f32 / 100.0));
            }
        });
        handle.join().unwrap();
        assert_eq!(log.len(), 100);
        assert_eq!(log.snapshot().len(), 100);
        // The writer moved into the thread was dropped on exit.
        assert!(log.writer().is_some());
    }
}
