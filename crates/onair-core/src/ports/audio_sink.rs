//! Audio sink port: the push contract every output implements.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AudioFrame;

/// Errors a sink may report for a single write.
///
/// The bus logs these per sink and never propagates them.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's downstream (process, socket, device) has gone away.
    #[error("sink closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame is not something this sink can accept.
    #[error("frame rejected: {0}")]
    Rejected(String),
}

/// An output that receives PCM16 mono frames at the internal sample rate.
///
/// Audio is pushed, never pulled: the sink must not assume a device clock
/// drives the cadence of `write` calls.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Name used in logs and for exclusion routing on the bus.
    fn name(&self) -> &str;

    /// Deliver one frame. Called from the sink's own worker, in FIFO order.
    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError>;

    /// Drop audio that has been accepted but not yet emitted.
    ///
    /// Sinks that cannot recall audio (an encoder pipe) keep the default.
    fn clear(&self) {}
}
