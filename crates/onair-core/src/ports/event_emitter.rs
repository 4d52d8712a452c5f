//! Event emitter trait for show observers.
//!
//! Implementations handle transport details (channels, websockets, logs).

use tokio::sync::mpsc;

use crate::events::ShowEvent;

/// Sink for [`ShowEvent`]s.
///
/// Keeps channel types out of the orchestrator's public API. `emit` must not
/// block: the orchestrator calls it from its control loop.
pub trait ShowEventEmitter: Send + Sync {
    fn emit(&self, event: ShowEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ShowEventEmitter>;
}

/// Discards every event. For tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShowEventEmitter for NoopEmitter {
    fn emit(&self, _event: ShowEvent) {}

    fn clone_box(&self) -> Box<dyn ShowEventEmitter> {
        Box::new(self.clone())
    }
}

/// Forwards events into an unbounded channel.
///
/// A dropped receiver is not an error; events are simply lost.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<ShowEvent>,
}

impl ChannelEmitter {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<ShowEvent>) -> Self {
        Self { tx }
    }

    /// Create an emitter together with the receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ShowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ShowEventEmitter for ChannelEmitter {
    fn emit(&self, event: ShowEvent) {
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn ShowEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn noop_emitter_accepts_events() {
        let emitter: Arc<dyn ShowEventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(ShowEvent::PaddingInserted { duration_ms: 10 });
        let _boxed = emitter.clone_box();
    }

    #[tokio::test]
    async fn channel_emitter_delivers_in_order() {
        let (emitter, mut rx) = ChannelEmitter::channel();
        emitter.emit(ShowEvent::VisualContext { topic: "a".into() });
        emitter
            .clone_box()
            .emit(ShowEvent::VisualContext { topic: "b".into() });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first, ShowEvent::VisualContext { topic: "a".into() });
        assert_eq!(second, ShowEvent::VisualContext { topic: "b".into() });
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (emitter, rx) = ChannelEmitter::channel();
        drop(rx);
        emitter.emit(ShowEvent::PaddingInserted { duration_ms: 1 });
    }
}
