use crate::domain::InterruptSignal;

/// Producer side of the interrupt queue.
///
/// Handed to anything that can interrupt the show (the telephony bridge,
/// news or trend feeds, a comment box). Publishing never blocks.
pub trait InterruptPublisher: Send + Sync {
    /// Queue `signal` for the orchestrator. Returns `false` once the show
    /// has stopped listening.
    fn publish(&self, signal: InterruptSignal) -> bool;
}
