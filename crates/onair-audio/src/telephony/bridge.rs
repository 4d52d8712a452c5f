//! Telephony bridge: the show as heard and interrupted over the phone.
//!
//! Outbound, the bridge is an [`AudioSink`]: each show frame is decimated to
//! 8 kHz and mu-law encoded once, then handed to every call's pump, which
//! emits exactly one 20 ms media message per tick (silence when idle) so the
//! carrier never sees a gap. Inbound, each call's [`CallHandler`] decodes
//! caller audio, runs VAD, rebroadcasts the caller on the bus, and turns
//! speech into interrupts.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use onair_core::{
    AudioFrame, AudioSink, InterruptPublisher, InterruptSignal, SAMPLE_RATE, ShowEvent,
    ShowEventEmitter, SinkError, TelephonySettings, Transcriber, duration_to_samples,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::carrier::CarrierCommand;
use super::session::{CallSession, MediaOutcome};
use crate::bus::AudioBus;
use crate::codec::{self, MULAW_SILENCE};
use crate::resample::{TELEPHONY_SAMPLE_RATE, downsample_to_telephony, upsample_from_telephony};
use crate::vad::{VadEvent, VadState};

/// Upper bound on mu-law buffered per call (30 s); older audio is dropped.
const MAX_PENDING_BYTES: usize = 30 * TELEPHONY_SAMPLE_RATE as usize;

enum PumpCommand {
    Audio(Arc<[u8]>),
    Clear,
}

struct CallLink {
    call_id: u64,
    audio_tx: mpsc::UnboundedSender<PumpCommand>,
    cancel: CancellationToken,
}

/// Adapter between the show and any number of concurrent phone calls.
pub struct TelephonyBridge {
    name: String,
    settings: TelephonySettings,
    bus: Arc<AudioBus>,
    interrupts: Arc<dyn InterruptPublisher>,
    transcriber: Arc<dyn Transcriber>,
    emitter: Arc<dyn ShowEventEmitter>,
    calls: Mutex<HashMap<String, CallLink>>,
    next_call_id: AtomicU64,
}

impl TelephonyBridge {
    /// Sink name used on the bus; caller audio is never routed back to it.
    pub const NAME: &'static str = "telephony";

    #[must_use]
    pub fn new(
        settings: TelephonySettings,
        bus: Arc<AudioBus>,
        interrupts: Arc<dyn InterruptPublisher>,
        transcriber: Arc<dyn Transcriber>,
        emitter: Arc<dyn ShowEventEmitter>,
    ) -> Self {
        Self {
            name: Self::NAME.to_string(),
            settings,
            bus,
            interrupts,
            transcriber,
            emitter,
            calls: Mutex::new(HashMap::new()),
            next_call_id: AtomicU64::new(1),
        }
    }

    fn lock_calls(&self) -> MutexGuard<'_, HashMap<String, CallLink>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn active_calls(&self) -> usize {
        self.lock_calls().len()
    }

    /// Begin a call. Outbound carrier messages for it are sent on `outbound`.
    ///
    /// The returned handler owns the call's inbound state; dropping it ends
    /// the call.
    pub fn start_call(
        self: &Arc<Self>,
        stream_id: impl Into<String>,
        outbound: mpsc::Sender<CarrierCommand>,
    ) -> CallHandler {
        let stream_id = stream_id.into();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(run_outbound_pump(
            stream_id.clone(),
            self.settings.frame(),
            audio_rx,
            outbound,
            cancel.clone(),
        ));

        let link = CallLink {
            call_id,
            audio_tx,
            cancel,
        };
        let previous = self.lock_calls().insert(stream_id.clone(), link);
        if let Some(previous) = previous {
            warn!(stream_id = %stream_id, "Stream restarted, replacing previous call");
            previous.cancel.cancel();
        }

        info!(stream_id = %stream_id, "Call started");
        CallHandler {
            bridge: Arc::clone(self),
            call_id,
            session: CallSession::new(stream_id, &self.settings),
        }
    }

    /// Stop the pump for `stream_id`. Idempotent.
    pub fn end_call(&self, stream_id: &str) {
        if let Some(link) = self.lock_calls().remove(stream_id) {
            link.cancel.cancel();
            info!(stream_id = %stream_id, "Call ended");
        }
    }

    /// End the call only if `stream_id` still belongs to `call_id`.
    fn release_call(&self, stream_id: &str, call_id: u64) {
        let mut calls = self.lock_calls();
        if calls.get(stream_id).is_some_and(|link| link.call_id == call_id) {
            if let Some(link) = calls.remove(stream_id) {
                link.cancel.cancel();
                info!(stream_id = %stream_id, "Call ended");
            }
        }
    }

    fn on_vad_event(&self, stream_id: &str, event: VadEvent) {
        match event {
            VadEvent::SpeechStart => {
                info!(stream_id = %stream_id, "Caller started speaking");
                if !self.interrupts.publish(InterruptSignal::caller_speaking()) {
                    debug!(stream_id = %stream_id, "Interrupt queue closed");
                }
            }
            VadEvent::SpeechEnd { audio } => {
                let transcriber = Arc::clone(&self.transcriber);
                let interrupts = Arc::clone(&self.interrupts);
                let emitter = Arc::clone(&self.emitter);
                let stream_id = stream_id.to_string();
                tokio::spawn(async move {
                    match transcriber.transcribe(&audio, TELEPHONY_SAMPLE_RATE).await {
                        Ok(text) if !text.trim().is_empty() => {
                            let text = text.trim().to_string();
                            info!(stream_id = %stream_id, chars = text.len(), "Caller transcribed");
                            emitter.emit(ShowEvent::CallerSpeech {
                                stream_id,
                                text: text.clone(),
                            });
                            interrupts.publish(InterruptSignal::listener(text));
                        }
                        Ok(_) => debug!(stream_id = %stream_id, "Empty transcript"),
                        Err(e) => warn!(stream_id = %stream_id, error = %e, "Transcription failed"),
                    }
                });
            }
            VadEvent::Discarded { duration } => {
                debug!(
                    stream_id = %stream_id,
                    duration_ms = duration.as_millis() as u64,
                    "Caller noise discarded"
                );
            }
        }
    }
}

#[async_trait]
impl AudioSink for TelephonyBridge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError> {
        if frame.sample_rate() != SAMPLE_RATE {
            return Err(SinkError::Rejected(format!(
                "expected {SAMPLE_RATE} Hz, got {} Hz",
                frame.sample_rate()
            )));
        }
        let calls = self.lock_calls();
        if calls.is_empty() {
            return Ok(());
        }

        let mulaw: Arc<[u8]> = codec::encode(&downsample_to_telephony(frame.samples())).into();
        for link in calls.values() {
            let _ = link.audio_tx.send(PumpCommand::Audio(Arc::clone(&mulaw)));
        }
        Ok(())
    }

    fn clear(&self) {
        for link in self.lock_calls().values() {
            let _ = link.audio_tx.send(PumpCommand::Clear);
        }
    }
}

/// Emits one frame of mu-law per tick for a single call.
async fn run_outbound_pump(
    stream_id: String,
    frame: Duration,
    mut audio_rx: mpsc::UnboundedReceiver<PumpCommand>,
    outbound: mpsc::Sender<CarrierCommand>,
    cancel: CancellationToken,
) {
    let frame_bytes = duration_to_samples(frame, TELEPHONY_SAMPLE_RATE).max(1);
    let mut pending: VecDeque<u8> = VecDeque::new();
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            command = audio_rx.recv() => match command {
                Some(PumpCommand::Audio(bytes)) => {
                    pending.extend(bytes.iter().copied());
                    let excess = pending.len().saturating_sub(MAX_PENDING_BYTES);
                    if excess > 0 {
                        pending.drain(..excess);
                    }
                }
                Some(PumpCommand::Clear) => {
                    pending.clear();
                    if outbound.send(CarrierCommand::clear(&stream_id)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                let take = pending.len().min(frame_bytes);
                let mut chunk: Vec<u8> = pending.drain(..take).collect();
                chunk.resize(frame_bytes, MULAW_SILENCE);
                if outbound.send(CarrierCommand::media(&stream_id, &chunk)).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(stream_id = %stream_id, "Outbound pump stopped");
}

/// Inbound side of one call.
pub struct CallHandler {
    bridge: Arc<TelephonyBridge>,
    call_id: u64,
    session: CallSession,
}

impl CallHandler {
    #[must_use]
    pub fn stream_id(&self) -> &str {
        self.session.stream_id()
    }

    #[must_use]
    pub const fn vad_state(&self) -> VadState {
        self.session.vad_state()
    }

    /// Process one inbound media payload. Returns `false` when the call
    /// should be hung up.
    pub fn handle_media(&mut self, payload: &str) -> bool {
        match self.session.ingest(payload) {
            MediaOutcome::Audio { pcm, events } => {
                if !pcm.is_empty() {
                    let upsampled = upsample_from_telephony(&pcm, self.bridge.settings.inbound_gain);
                    let frame = AudioFrame::new(upsampled, SAMPLE_RATE);
                    self.bridge.bus.write_excluding(&frame, self.bridge.name());
                }
                for event in events {
                    self.bridge.on_vad_event(self.session.stream_id(), event);
                }
                true
            }
            MediaOutcome::Dropped => true,
            MediaOutcome::EndCall => {
                error!(
                    stream_id = %self.session.stream_id(),
                    failures = self.session.codec_failures(),
                    "Too many undecodable frames, ending call"
                );
                false
            }
        }
    }
}

impl Drop for CallHandler {
    fn drop(&mut self) {
        self.bridge
            .release_call(self.session.stream_id(), self.call_id);
    }
}
