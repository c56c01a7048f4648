//! Streaming session orchestration.
//!
//! ```text
//!  bootstrap: capture ─► shape ─► POST {key, init}
//!
//!  ┌──────────────────────┐  mpsc(10)   ┌──────────────────────┐
//!  │ Producer (OS thread) │ ──────────► │ Consumer (tokio task)│ ─► PUT {frame}
//!  └──────────────────────┘             └──────────────────────┘
//!             ▲                                    ▲
//!             └──────────── CancelToken ───────────┘
//! ```
//!
//! Whichever side hits an unrecoverable error trips the token; Ctrl-C trips
//! it too. The controller then joins both workers and returns the first
//! recorded error.

pub mod cancel;
pub mod consumer;
pub mod producer;

pub use cancel::{CancelToken, StreamStats};

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{EndpointConfig, PixelBudget, StreamConfig, TimingConfig};
use crate::error::{Result, StreamError};
use crate::protocol::{FrameEnvelope, Identity, InitPayload};
use crate::screen::capture::CaptureSource;
use crate::screen::scale::{normalize_alpha, scale_to_budget};
use crate::screen::Raster;
use crate::transport::{default_headers, HttpMethod, Transport};
use consumer::Consumer;
use producer::Producer;

/// Scale, normalise and encode one captured raster.
///
/// Bootstrap and the steady-state loop both go through here so the first
/// frame is shaped exactly like every later one. `captured_at` is the moment
/// the grab returned, not the moment shaping finished.
pub fn shape_frame(
    raster: Raster,
    captured_at: DateTime<Utc>,
    budget: PixelBudget,
    identity: &Identity,
) -> Result<FrameEnvelope> {
    let mut raster = scale_to_budget(raster, budget.max_pixels)?;
    normalize_alpha(&mut raster);
    Ok(FrameEnvelope::encode(&raster, identity, captured_at))
}

pub struct Pipeline<S: CaptureSource, T: Transport> {
    source: Arc<S>,
    transport: Arc<T>,
    stream: StreamConfig,
    budget: PixelBudget,
    base_url: String,
    headers: HeaderMap,
    timing: TimingConfig,
}

impl<S: CaptureSource, T: Transport> Pipeline<S, T> {
    /// Validate everything up front; nothing is captured or sent here.
    pub fn new(
        source: S,
        transport: T,
        stream: StreamConfig,
        endpoint: &EndpointConfig,
        timing: TimingConfig,
    ) -> Result<Self> {
        stream.validate()?;
        if endpoint.base_url.trim().is_empty() {
            return Err(StreamError::config("endpoint base_url cannot be empty"));
        }
        let headers = default_headers(&endpoint.header_name, &endpoint.header_value)?;

        Ok(Self {
            source: Arc::new(source),
            transport: Arc::new(transport),
            budget: stream.budget(),
            stream,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            headers,
            timing,
        })
    }

    /// Where steady-state frames are PUT.
    pub fn frame_url(&self) -> String {
        format!("{}/{}", self.base_url, self.stream.session_key)
    }

    /// Capture, shape and POST the initial frame.
    pub async fn bootstrap(&self) -> Result<()> {
        info!("Capturing initial screen snapshot...");
        let source = Arc::clone(&self.source);
        let index = self.stream.display_index;
        let budget = self.budget;
        let identity = self.stream.identity();
        let envelope = tokio::task::spawn_blocking(move || {
            let raster = source.capture(index)?;
            shape_frame(raster, Utc::now(), budget, &identity)
        })
        .await??;

        let payload: Value = serde_json::to_value(InitPayload::new(&self.stream.session_key, &envelope)?)?;
        self.transport
            .send(
                &self.base_url,
                &payload,
                HttpMethod::Post,
                &self.headers,
                self.timing.request_timeout(),
            )
            .await?;

        info!(
            "Initial screenshot sent successfully ({}x{})",
            envelope.width, envelope.height
        );
        Ok(())
    }

    /// Run a whole session: bootstrap, then stream until a worker fails or
    /// `shutdown` resolves.
    ///
    /// Bootstrap failure returns immediately without starting any worker.
    /// A shutdown request is handled like a failure without a cause: the
    /// token is tripped once and both workers are joined, never aborted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<StreamStats>
    where
        F: Future<Output = ()>,
    {
        self.bootstrap().await?;

        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel::<FrameEnvelope>(self.timing.queue_capacity.max(1));

        let producer = Producer {
            source: Arc::clone(&self.source),
            display_index: self.stream.display_index,
            budget: self.budget,
            identity: self.stream.identity(),
            frame_delay: self.timing.frame_delay(),
            enqueue_timeout: self.timing.enqueue_timeout(),
            tx,
            cancel: cancel.clone(),
            runtime: Handle::current(),
        }
        .spawn()?;

        let consumer = tokio::spawn(
            Consumer {
                transport: Arc::clone(&self.transport),
                url: self.frame_url(),
                headers: self.headers.clone(),
                request_timeout: self.timing.request_timeout(),
                dequeue_timeout: self.timing.dequeue_timeout(),
                rx,
                cancel: cancel.clone(),
            }
            .run(),
        );

        info!("Starting continuous capture... (Press Ctrl+C to stop)");

        let mut ticker = tokio::time::interval(self.timing.poll_interval());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping capture and sending...");
                    break;
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        break;
                    }
                }
            }
        }
        cancel.cancel();

        let consumer_result = consumer.await;
        let producer_result = tokio::task::spawn_blocking(move || producer.join()).await?;
        consumer_result?;
        if producer_result.is_err() {
            return Err(StreamError::WorkerPanicked("capture thread".into()));
        }

        let stats = cancel.stats();
        info!(
            "Session ended: {} frames sent, {} dropped",
            stats.frames_sent, stats.frames_dropped
        );

        match cancel.take_cause() {
            Some(err) => {
                warn!("Session stopped by: {}", err);
                Err(err)
            }
            None => Ok(stats),
        }
    }
}
