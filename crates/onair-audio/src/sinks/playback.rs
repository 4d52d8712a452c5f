//! Local preview through the default output device.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the stream and its
//! sink live on a dedicated OS thread. [`PreviewSink`] is the `Send + Sync`
//! proxy the bus talks to; every operation is a fire-and-forget command.

use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use onair_core::{AudioFrame, AudioSink, SinkError};
use rodio::{OutputStream, Sink};

use crate::error::AudioError;

enum PlaybackCommand {
    Append { samples: Vec<i16>, sample_rate: u32 },
    Clear,
    Shutdown,
}

/// Plays show audio on the local machine.
pub struct PreviewSink {
    cmd_tx: mpsc::Sender<PlaybackCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PreviewSink {
    /// Spawn the audio thread and open the default output device.
    ///
    /// Device errors are reported back through a one-shot init channel.
    pub fn spawn() -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlaybackCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        let thread = thread::Builder::new()
            .name("onair-preview".into())
            .spawn(move || run(&cmd_rx, &init_tx))?;

        init_rx.recv().map_err(|_| AudioError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }
}

fn run(cmd_rx: &mpsc::Receiver<PlaybackCommand>, init_tx: &mpsc::Sender<Result<(), AudioError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::OutputUnavailable(e.to_string())));
            return;
        }
    };
    let mut sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::OutputUnavailable(e.to_string())));
            return;
        }
    };
    if init_tx.send(Ok(())).is_err() {
        return;
    }
    tracing::info!("Preview playback on default output device");

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlaybackCommand::Append {
                samples,
                sample_rate,
            } => {
                sink.append(rodio::buffer::SamplesBuffer::new(1, sample_rate, samples));
            }
            PlaybackCommand::Clear => {
                sink.stop();
                match Sink::try_new(&handle) {
                    Ok(fresh) => sink = fresh,
                    Err(e) => {
                        tracing::warn!(error = %e, "Preview sink could not be recreated");
                        break;
                    }
                }
            }
            PlaybackCommand::Shutdown => break,
        }
    }

    tracing::debug!("Preview thread shutting down");
}

#[async_trait]
impl AudioSink for PreviewSink {
    fn name(&self) -> &str {
        "preview"
    }

    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError> {
        self.cmd_tx
            .send(PlaybackCommand::Append {
                samples: frame.samples().to_vec(),
                sample_rate: frame.sample_rate(),
            })
            .map_err(|_| SinkError::Closed)
    }

    fn clear(&self) {
        let _ = self.cmd_tx.send(PlaybackCommand::Clear);
    }
}

impl Drop for PreviewSink {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(PlaybackCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
