//! Capture loop, runs on its own OS thread.
//!
//! capture → scale → normalise → encode → enqueue, then sleep. A full queue
//! sheds the frame instead of stalling; anything wrong with the capture
//! itself ends the session.

use chrono::Utc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::{debug, error, info};

use super::{shape_frame, CancelToken};
use crate::config::PixelBudget;
use crate::protocol::{FrameEnvelope, Identity};
use crate::screen::capture::CaptureSource;

/// Outcome of offering one frame to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// Queue stayed full for the whole timeout; the frame is gone.
    Dropped,
    /// Consumer side went away.
    Closed,
}

/// Offer `envelope` to the queue, waiting at most `timeout` for a slot.
///
/// Must be called from outside the runtime (it blocks on `runtime`), and
/// `runtime` must be multi-threaded: the timeout only fires if a worker
/// thread is driving the timer while this thread blocks.
pub fn enqueue(
    runtime: &Handle,
    tx: &mpsc::Sender<FrameEnvelope>,
    envelope: FrameEnvelope,
    timeout: Duration,
) -> Enqueue {
    match runtime.block_on(tx.send_timeout(envelope, timeout)) {
        Ok(()) => Enqueue::Queued,
        Err(SendTimeoutError::Timeout(_)) => Enqueue::Dropped,
        Err(SendTimeoutError::Closed(_)) => Enqueue::Closed,
    }
}

pub struct Producer<S: CaptureSource> {
    pub source: Arc<S>,
    pub display_index: usize,
    pub budget: PixelBudget,
    pub identity: Identity,
    pub frame_delay: Duration,
    pub enqueue_timeout: Duration,
    pub tx: mpsc::Sender<FrameEnvelope>,
    pub cancel: CancelToken,
    pub runtime: Handle,
}

impl<S: CaptureSource> Producer<S> {
    /// Start the loop on a dedicated thread (capture handles can't move
    /// between threads, so it opens its own).
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("screencast-capture".into())
            .spawn(move || self.run())
    }

    fn run(self) {
        let mut capture = match self.source.open(self.display_index) {
            Ok(c) => c,
            Err(e) => {
                error!("Screen capture: failed to start: {}", e);
                self.cancel.fail(e);
                return;
            }
        };
        info!("Capturing display {}", self.display_index);

        while !self.cancel.is_cancelled() {
            let (raster, captured_at) = match capture.grab() {
                Ok(r) => (r, Utc::now()),
                Err(e) => {
                    error!("Screen capture: {}", e);
                    self.cancel.fail(e);
                    break;
                }
            };

            let envelope = match shape_frame(raster, captured_at, self.budget, &self.identity) {
                Ok(env) => env,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    self.cancel.fail(e);
                    break;
                }
            };

            match enqueue(&self.runtime, &self.tx, envelope, self.enqueue_timeout) {
                Enqueue::Queued => {}
                Enqueue::Dropped => {
                    // Consumer can't keep up, skip this frame
                    self.cancel.record_dropped();
                    debug!("Queue full, dropped frame");
                }
                Enqueue::Closed => break,
            }

            std::thread::sleep(self.frame_delay);
        }

        debug!("Capture loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::Raster;
    use std::time::Instant;

    fn envelope(seq: u32) -> FrameEnvelope {
        let raster = Raster::filled(1, 1, [0, 0, 0, 255]).unwrap();
        let identity = Identity {
            host_name: "PC1".into(),
            user_name: "tester".into(),
        };
        let mut env = FrameEnvelope::encode(&raster, &identity, Utc::now());
        // width doubles as a sequence number here
        env.width = seq;
        env
    }

    #[test]
    fn test_full_queue_drops_eleventh_frame() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, mut rx) = mpsc::channel(10);
        let timeout = Duration::from_millis(50);

        for seq in 0..10 {
            assert_eq!(enqueue(rt.handle(), &tx, envelope(seq), timeout), Enqueue::Queued);
        }

        let started = Instant::now();
        assert_eq!(enqueue(rt.handle(), &tx, envelope(10), timeout), Enqueue::Dropped);
        assert!(started.elapsed() < Duration::from_secs(1));

        drop(tx);
        let mut seen = Vec::new();
        while let Ok(env) = rx.try_recv() {
            seen.push(env.width);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_closed_queue_is_reported() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert_eq!(
            enqueue(rt.handle(), &tx, envelope(0), Duration::from_millis(10)),
            Enqueue::Closed
        );
    }
}
