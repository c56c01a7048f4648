use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Every way a streaming session can fail.
///
/// All of these are fatal to the session. Dropped frames are not errors and
/// never show up here.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Rejected configuration (empty key/username, zero budget, ...)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid display {index}: choose a number between 1 and {available}")]
    InvalidDisplayIndex { index: usize, available: usize },

    /// Capture backend failed for a reason other than a bad index
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("invalid raster: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidRaster {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Timeout, refused connection, DNS failure, broken body stream
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("rejected by server: HTTP {0}")]
    RejectedByServer(u16),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::RejectedByServer(status.as_u16()),
            None => Self::TransportFailure(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::WorkerPanicked(err.to_string())
    }
}
