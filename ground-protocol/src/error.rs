//! Closed error taxonomy shared by every worker in the pipeline.
use thiserror::Error;

/// Errors a worker loop must fold every failure into before deciding whether
/// to retry, dead-letter, or simply log-and-ack.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("malformed input: {0}")]
    Input(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("frame format error: {0}")]
    FrameFormat(String),

    #[error("no decoder registered for packet {0:?}")]
    DecoderNotFound(String),

    #[error("decoder for {packet:?} failed: {source}")]
    DecoderFailed {
        packet: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("transient I/O: {0}")]
    TransientIo(String),

    #[error("permanent I/O: {0}")]
    PermanentIo(String),
}

impl CoreError {
    /// `TransientIo` is the only variant that should drive a reconnect/backoff loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientIo(_))
    }
}
