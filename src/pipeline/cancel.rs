use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::StreamError;

/// Shared stop signal for one streaming session.
///
/// Either worker (or the controller, on Ctrl-C) may trip it; once set it
/// stays set. The first failure reported through [`fail`](Self::fail) is
/// kept so the controller can hand it back after both workers have exited.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    cancelled: AtomicBool,
    cause: Mutex<Option<StreamError>>,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Counters reported once a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop without blaming anything. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Record `err` as the reason for stopping (unless something already
    /// failed first) and request a stop.
    pub fn fail(&self, err: StreamError) {
        {
            let mut cause = self
                .inner
                .cause
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if cause.is_none() {
                *cause = Some(err);
            }
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Take the recorded failure, if any.
    pub fn take_cause(&self) -> Option<StreamError> {
        self.inner
            .cause
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub(crate) fn record_sent(&self) {
        self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            frames_sent: self.inner.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.inner.frames_dropped.load(Ordering::Relaxed),
        }
    }
}
