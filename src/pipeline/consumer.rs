//! Send loop: one request in flight, FIFO order.

use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error};

use super::CancelToken;
use crate::protocol::{FrameEnvelope, FramePayload};
use crate::transport::{HttpMethod, Transport};

pub struct Consumer<T: Transport> {
    pub transport: Arc<T>,
    /// `<base-url>/<session key>`
    pub url: String,
    pub headers: HeaderMap,
    pub request_timeout: Duration,
    pub dequeue_timeout: Duration,
    pub rx: mpsc::Receiver<FrameEnvelope>,
    pub cancel: CancelToken,
}

impl<T: Transport> Consumer<T> {
    pub async fn run(mut self) {
        while !self.cancel.is_cancelled() {
            let envelope = match timeout(self.dequeue_timeout, self.rx.recv()).await {
                Ok(Some(env)) => env,
                // Producer is gone, nothing more will arrive
                Ok(None) => break,
                Err(_) => continue,
            };

            let payload = match FramePayload::new(&envelope).and_then(|p| Ok(serde_json::to_value(p)?)) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to encode frame payload: {}", e);
                    self.cancel.fail(e);
                    break;
                }
            };

            match self
                .transport
                .send(
                    &self.url,
                    &payload,
                    HttpMethod::Put,
                    &self.headers,
                    self.request_timeout,
                )
                .await
            {
                Ok(()) => {
                    self.cancel.record_sent();
                    debug!("Sent screen data ({}x{})", envelope.width, envelope.height);
                }
                Err(e) => {
                    // Stale frames are worthless, a broken session must surface now
                    error!("Error sending frame: {}", e);
                    self.cancel.fail(e);
                    break;
                }
            }
        }

        debug!("Send loop stopped");
    }
}
