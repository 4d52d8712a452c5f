//! Interrupt intake: a cloneable sender for producers and a priority queue
//! the orchestrator polls.
//!
//! Producers (the telephony bridge, news and trend feeds, a chat relay) hold
//! an [`InterruptSender`]. The orchestrator owns the [`InterruptQueue`] and
//! takes at most one signal per poll: the highest priority one, oldest first
//! among equals. Everything else stays queued.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use onair_core::{AdLibSettings, InterruptPublisher, InterruptSignal, InterruptSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Create a connected sender/queue pair.
pub fn channel(ad_lib: AdLibSettings) -> (InterruptSender, InterruptQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InterruptSender { tx }, InterruptQueue::new(rx, ad_lib))
}

/// Cloneable handle for anything that wants to interrupt the show.
#[derive(Debug, Clone)]
pub struct InterruptSender {
    tx: mpsc::UnboundedSender<InterruptSignal>,
}

impl InterruptSender {
    /// Queue breaking news. Returns `false` once the show has ended.
    pub fn breaking_news(&self, headline: impl Into<String>) -> bool {
        self.publish(InterruptSignal::breaking_news(headline))
    }

    /// Queue a typed listener comment.
    pub fn listener(&self, text: impl Into<String>) -> bool {
        self.publish(InterruptSignal::listener(text))
    }

    pub fn trend(&self, topic: impl Into<String>) -> bool {
        self.publish(InterruptSignal::trend(topic))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl InterruptPublisher for InterruptSender {
    fn publish(&self, signal: InterruptSignal) -> bool {
        debug!(source = %signal.source, "Interrupt published");
        self.tx.send(signal).is_ok()
    }
}

#[derive(Debug)]
struct Pending {
    signal: InterruptSignal,
    seq: u64,
}

impl Pending {
    fn key(&self) -> (u8, Reverse<u64>) {
        (self.signal.priority(), Reverse(self.seq))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// How a wait for a caller's words ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptWait {
    Transcript(String),
    /// A signal above listener priority is queued. It is left in place.
    Preempted,
    TimedOut,
    /// Every producer is gone.
    Closed,
}

/// Pending interrupts, highest priority first.
#[derive(Debug)]
pub struct InterruptQueue {
    rx: mpsc::UnboundedReceiver<InterruptSignal>,
    pending: BinaryHeap<Pending>,
    next_seq: u64,
    /// Arrival order of the last caller placeholder handed out.
    placeholder: Option<u64>,
    ad_lib: AdLibSettings,
    rng: StdRng,
}

impl InterruptQueue {
    fn new(rx: mpsc::UnboundedReceiver<InterruptSignal>, ad_lib: AdLibSettings) -> Self {
        Self {
            rx,
            pending: BinaryHeap::new(),
            next_seq: 0,
            placeholder: None,
            ad_lib,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Make ad-lib rolls reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn push(&mut self, signal: InterruptSignal) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending { signal, seq });
    }

    /// Move everything producers have sent so far into the heap.
    fn drain(&mut self) {
        while let Ok(signal) = self.rx.try_recv() {
            self.push(signal);
        }
    }

    fn pop(&mut self) -> Option<InterruptSignal> {
        let Pending { signal, seq } = self.pending.pop()?;
        if signal.awaiting_transcript() {
            self.placeholder = Some(seq);
        }
        Some(signal)
    }

    /// Number of queued signals.
    pub fn len(&mut self) -> usize {
        self.drain();
        self.pending.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Take the highest priority queued signal. Never rolls an ad-lib.
    pub fn take(&mut self) -> Option<InterruptSignal> {
        self.drain();
        self.pop()
    }

    /// Take the highest priority signal whose priority is above `floor`.
    ///
    /// With no floor any signal qualifies, and when nothing is queued the
    /// ad-lib policy may produce a [`InterruptSource::PeerAgentAdLib`]
    /// signal. Signals at or below the floor stay queued.
    pub fn poll(&mut self, floor: Option<u8>) -> Option<InterruptSignal> {
        self.drain();
        let qualifies = self
            .pending
            .peek()
            .is_some_and(|top| floor.is_none_or(|f| top.signal.priority() > f));
        if qualifies {
            return self.pop();
        }
        if floor.is_none() && self.pending.is_empty() && self.roll_ad_lib() {
            info!("Ad-lib triggered");
            return Some(InterruptSignal::ad_lib());
        }
        None
    }

    fn roll_ad_lib(&mut self) -> bool {
        self.ad_lib.is_active() && self.rng.random_bool(self.ad_lib.probability.clamp(0.0, 1.0))
    }

    /// Wait up to `timeout` for a caller's transcript.
    ///
    /// Only a `ListenerInput` carrying text that arrived after the caller's
    /// placeholder counts; earlier typed comments stay queued. Further
    /// placeholders seen while waiting are dropped. Returns early, leaving
    /// the queue untouched, once anything above listener priority is queued.
    pub async fn wait_for_transcript(&mut self, timeout: Duration) -> TranscriptWait {
        let deadline = Instant::now() + timeout;
        self.drain();
        let queued = self
            .pending
            .iter()
            .filter(|p| p.signal.awaiting_transcript())
            .map(|p| p.seq)
            .max();
        let since = queued.max(self.placeholder);
        let listener = InterruptSource::ListenerInput.priority();

        loop {
            self.drain();
            self.pending.retain(|p| !p.signal.awaiting_transcript());
            if let Some(text) = self.take_transcript(since) {
                return TranscriptWait::Transcript(text);
            }
            if self
                .pending
                .peek()
                .is_some_and(|top| top.signal.priority() > listener)
            {
                debug!("Transcript wait preempted");
                return TranscriptWait::Preempted;
            }

            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    debug!("No transcript before timeout");
                    return TranscriptWait::TimedOut;
                }
                received = self.rx.recv() => match received {
                    Some(signal) => self.push(signal),
                    None => return TranscriptWait::Closed,
                },
            }
        }
    }

    fn take_transcript(&mut self, since: Option<u64>) -> Option<String> {
        let seq = self
            .pending
            .iter()
            .filter(|p| p.signal.source == InterruptSource::ListenerInput)
            .filter(|p| since.is_none_or(|s| p.seq > s))
            .map(|p| p.seq)
            .min()?;
        let mut found = None;
        self.pending.retain(|p| {
            if p.seq == seq {
                found = Some(p.signal.payload.trim().to_string());
                false
            } else {
                true
            }
        });
        found
    }
}
