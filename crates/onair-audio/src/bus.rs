//! Audio distribution bus: one write reaches every registered sink.
//!
//! Each sink gets its own bounded FIFO and worker task, so a slow or failing
//! output can only hurt itself. The bus holds weak references: dropping the
//! last `Arc` of a sink removes it as surely as [`AudioBus::deregister`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use onair_core::{AudioFrame, AudioSink};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default per-sink queue depth, in frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

enum SinkCommand {
    Frame { frame: AudioFrame, epoch: u64 },
    Flush(oneshot::Sender<()>),
}

struct SinkSlot {
    name: String,
    sink: Weak<dyn AudioSink>,
    tx: mpsc::Sender<SinkCommand>,
    /// Bumped by `clear`; queued frames from an older epoch are skipped.
    epoch: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl SinkSlot {
    fn is_alive(&self) -> bool {
        self.sink.strong_count() > 0 && !self.tx.is_closed()
    }

    fn is(&self, sink: &Arc<dyn AudioSink>) -> bool {
        Weak::ptr_eq(&self.sink, &Arc::downgrade(sink))
    }
}

impl Drop for SinkSlot {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Fan-out registry of audio outputs.
///
/// Must be used from within a Tokio runtime: registering a sink spawns its
/// worker task.
pub struct AudioBus {
    slots: RwLock<Vec<SinkSlot>>,
    queue_capacity: usize,
}

impl AudioBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, Vec<SinkSlot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, Vec<SinkSlot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `sink`. Returns `false` if it was already registered.
    pub fn register(&self, sink: &Arc<dyn AudioSink>) -> bool {
        let mut slots = self.write_slots();
        slots.retain(SinkSlot::is_alive);
        if slots.iter().any(|slot| slot.is(sink)) {
            return false;
        }

        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let epoch = Arc::new(AtomicU64::new(0));
        let worker = tokio::spawn(run_sink_worker(
            name.clone(),
            Arc::downgrade(sink),
            rx,
            Arc::clone(&epoch),
        ));

        debug!(sink = %name, "Sink registered");
        slots.push(SinkSlot {
            name,
            sink: Arc::downgrade(sink),
            tx,
            epoch,
            worker,
        });
        true
    }

    /// Remove `sink`. Returns `false` if it was not registered.
    ///
    /// Frames already queued for the sink are dropped.
    pub fn deregister(&self, sink: &Arc<dyn AudioSink>) -> bool {
        let mut slots = self.write_slots();
        let before = slots.len();
        slots.retain(|slot| !slot.is(sink));
        let removed = slots.len() != before;
        if removed {
            debug!(sink = %sink.name(), "Sink deregistered");
        }
        removed
    }

    /// Number of live registered sinks.
    pub fn sink_count(&self) -> usize {
        self.read_slots().iter().filter(|s| s.is_alive()).count()
    }

    /// Names of live registered sinks, in registration order.
    pub fn sink_names(&self) -> Vec<String> {
        self.read_slots()
            .iter()
            .filter(|s| s.is_alive())
            .map(|s| s.name.clone())
            .collect()
    }

    /// Queue `frame` for every sink. Returns how many sinks accepted it.
    ///
    /// Never blocks: a sink whose queue is full loses this frame.
    pub fn write(&self, frame: &AudioFrame) -> usize {
        self.write_filtered(frame, |_| true)
    }

    /// Like [`write`](Self::write) but skips sinks named `excluded`.
    pub fn write_excluding(&self, frame: &AudioFrame, excluded: &str) -> usize {
        self.write_filtered(frame, |slot| slot.name != excluded)
    }

    fn write_filtered(&self, frame: &AudioFrame, include: impl Fn(&SinkSlot) -> bool) -> usize {
        let slots = self.read_slots();
        let mut accepted = 0;
        for slot in slots.iter().filter(|s| s.is_alive() && include(s)) {
            let command = SinkCommand::Frame {
                frame: frame.clone(),
                epoch: slot.epoch.load(Ordering::SeqCst),
            };
            match slot.tx.try_send(command) {
                Ok(()) => accepted += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(sink = %slot.name, "Sink queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(sink = %slot.name, "Sink worker gone, skipping");
                }
            }
        }
        accepted
    }

    /// Wait until every frame queued so far has been handed to its sink.
    pub async fn flush(&self) {
        let senders: Vec<_> = self
            .read_slots()
            .iter()
            .filter(|s| s.is_alive())
            .map(|s| s.tx.clone())
            .collect();

        let mut acks = Vec::with_capacity(senders.len());
        for tx in senders {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(SinkCommand::Flush(ack_tx)).await.is_ok() {
                acks.push(ack_rx);
            }
        }
        for ack in acks {
            // A worker that died mid-flush has nothing left to drain.
            let _ = ack.await;
        }
    }

    /// Drop audio queued but not yet written, on the bus and inside sinks.
    pub fn clear(&self) {
        for slot in self.read_slots().iter() {
            slot.epoch.fetch_add(1, Ordering::SeqCst);
            if let Some(sink) = slot.sink.upgrade() {
                sink.clear();
            }
        }
        debug!("Bus cleared");
    }
}

impl Default for AudioBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_sink_worker(
    name: String,
    sink: Weak<dyn AudioSink>,
    mut rx: mpsc::Receiver<SinkCommand>,
    epoch: Arc<AtomicU64>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Frame {
                frame,
                epoch: frame_epoch,
            } => {
                if frame_epoch != epoch.load(Ordering::SeqCst) {
                    continue;
                }
                let Some(sink) = sink.upgrade() else {
                    debug!(sink = %name, "Sink dropped, worker exiting");
                    break;
                };
                if let Err(e) = sink.write(&frame).await {
                    warn!(sink = %name, error = %e, "Sink write failed");
                }
            }
            SinkCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
