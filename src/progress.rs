use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Live progress shared between the reader, the workers and the signal handler.
///
/// This is the only counter written by more than one thread, so every
/// update is atomic. Final counts come from the combined summary, not from here.
#[derive(Debug, Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

#[derive(Debug)]
struct ProgressInner {
    read: AtomicU64,
    processed: AtomicU64,
    started: Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressInner {
                read: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    pub fn add_read(&self, n: u64) {
        self.inner.read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_processed(&self, n: u64) {
        self.inner.processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn read(&self) -> u64 {
        self.inner.read.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    pub fn format_progress(&self) -> String {
        format!(
            "Progress: {} lines read, {} processed after {}ms",
            self.read(),
            self.processed(),
            self.inner.started.elapsed().as_millis()
        )
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
