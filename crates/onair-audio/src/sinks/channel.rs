use async_trait::async_trait;
use onair_core::{AudioFrame, AudioSink, SinkError};
use tokio::sync::mpsc;

/// Forwards every frame into an unbounded channel.
///
/// Useful for monitoring taps (a websocket listener, a recorder) and tests.
pub struct ChannelSink {
    name: String,
    tx: mpsc::UnboundedSender<AudioFrame>,
}

impl ChannelSink {
    /// Create a sink together with the receiving end of its channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<AudioFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl AudioSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError> {
        self.tx.send(frame.clone()).map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use onair_core::SAMPLE_RATE;

    use super::*;

    #[tokio::test]
    async fn forwards_frames_and_reports_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new("tap");
        let frame = AudioFrame::new(vec![1, 2, 3], SAMPLE_RATE);
        sink.write(&frame).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), frame);

        drop(rx);
        assert!(matches!(sink.write(&frame).await, Err(SinkError::Closed)));
    }
}
