//! Shared handler state.

use std::sync::Arc;

use onair_audio::{AudioBus, TelephonyBridge};
use onair_core::InterruptPublisher;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything the handlers reach into. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<TelephonyBridge>,
    pub bus: Arc<AudioBus>,
    pub interrupts: Arc<dyn InterruptPublisher>,
    pub started_at: Instant,
    /// Open carrier sockets close when this fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(
        bridge: Arc<TelephonyBridge>,
        bus: Arc<AudioBus>,
        interrupts: Arc<dyn InterruptPublisher>,
    ) -> Self {
        Self {
            bridge,
            bus,
            interrupts,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie open sockets to an outer shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
