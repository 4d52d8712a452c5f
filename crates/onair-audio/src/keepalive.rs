//! Keep-alive wrapper: feeds silence to a sink whenever the show goes quiet.
//!
//! Streaming encoders and ingest servers treat a stalled input as a dead
//! stream. The wrapper tracks how far ahead real audio has been written and,
//! on a fixed cadence, tops the timeline up with silence once it runs out.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use onair_core::{AudioFrame, AudioSink, SinkError};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An [`AudioSink`] wrapper that never lets its inner sink starve.
pub struct KeepAliveSink {
    inner: Arc<dyn AudioSink>,
    covered_until: Arc<Mutex<Instant>>,
    cancel: CancellationToken,
}

impl KeepAliveSink {
    /// Wrap `inner` and start the silence ticker. Requires a Tokio runtime.
    pub fn spawn(inner: Arc<dyn AudioSink>, cadence: Duration) -> Self {
        let covered_until = Arc::new(Mutex::new(Instant::now()));
        let cancel = CancellationToken::new();

        tokio::spawn(run_ticker(
            Arc::clone(&inner),
            cadence,
            Arc::clone(&covered_until),
            cancel.clone(),
        ));

        Self {
            inner,
            covered_until,
            cancel,
        }
    }

    /// Stop the silence ticker. Real writes still pass through.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for KeepAliveSink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl AudioSink for KeepAliveSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError> {
        {
            let mut covered = self
                .covered_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *covered = (*covered).max(Instant::now()) + frame.duration();
        }
        self.inner.write(frame).await
    }

    fn clear(&self) {
        *self
            .covered_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.inner.clear();
    }
}

async fn run_ticker(
    inner: Arc<dyn AudioSink>,
    cadence: Duration,
    covered_until: Arc<Mutex<Instant>>,
    cancel: CancellationToken,
) {
    let silence = AudioFrame::silence(cadence);
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let due = {
                    let mut covered = covered_until.lock().unwrap_or_else(PoisonError::into_inner);
                    let now = Instant::now();
                    if now >= *covered {
                        *covered = now + cadence;
                        true
                    } else {
                        false
                    }
                };
                if !due {
                    continue;
                }
                match inner.write(&silence).await {
                    Ok(()) => {}
                    Err(SinkError::Closed) => {
                        debug!(sink = %inner.name(), "Keep-alive target closed");
                        break;
                    }
                    Err(e) => warn!(sink = %inner.name(), error = %e, "Keep-alive write failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use onair_core::SAMPLE_RATE;

    use super::*;
    use crate::sinks::ChannelSink;

    #[tokio::test(start_paused = true)]
    async fn fills_silence_when_idle() {
        let (tap, mut rx) = ChannelSink::new("tap");
        let sink = KeepAliveSink::spawn(Arc::new(tap), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;
        sink.stop();

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        assert!(frames.len() >= 3, "got {} frames", frames.len());
        assert!(frames.iter().all(AudioFrame::is_silent));
        assert_eq!(frames[0].duration(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn real_audio_suppresses_silence() {
        let (tap, mut rx) = ChannelSink::new("tap");
        let sink = KeepAliveSink::spawn(Arc::new(tap), Duration::from_millis(100));

        // One second of audio covers the next half second of ticks.
        let speech = AudioFrame::new(vec![500i16; SAMPLE_RATE as usize], SAMPLE_RATE);
        sink.write(&speech).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let first = rx.try_recv().unwrap();
        assert!(!first.is_silent());
        assert!(rx.try_recv().is_err());
        assert_eq!(sink.name(), "tap");
    }
}
