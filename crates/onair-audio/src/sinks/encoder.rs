//! External encoder process sink.
//!
//! The encoder (typically ffmpeg pushing to a streaming ingest) reads raw
//! PCM16 LE mono at the show rate on stdin. We never look at its stdout; its
//! stderr is forwarded to the log at debug level.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use onair_core::{AudioFrame, AudioSink, SAMPLE_RATE, SinkError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::AudioError;

/// Sink that pipes audio into a child process.
pub struct EncoderSink {
    name: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    shutdown_timeout: Duration,
}

impl EncoderSink {
    /// Spawn `command` (program followed by its arguments).
    pub fn spawn(command: &[String], shutdown_timeout: Duration) -> Result<Self, AudioError> {
        let (program, args) = command.split_first().ok_or(AudioError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AudioError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        if let Some(stderr) = child.stderr.take() {
            let log_program = program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(text)) = lines.next_line().await {
                    debug!(encoder = %log_program, "{text}");
                }
                debug!(encoder = %log_program, "stderr reader task exiting");
            });
        }

        info!(program = %program, pid = ?child.id(), "Encoder process started");

        Ok(Self {
            name: "encoder".to_string(),
            stdin: Mutex::new(stdin),
            child: Mutex::new(Some(child)),
            shutdown_timeout,
        })
    }

    /// Close stdin, give the process `shutdown_timeout` to finish, then kill it.
    ///
    /// Returns `None` if the process was already stopped.
    pub async fn shutdown(&self) -> Result<Option<ExitStatus>, AudioError> {
        // EOF on stdin is the encoder's cue to flush and exit.
        drop(self.stdin.lock().await.take());

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(None);
        };

        if let Ok(status) = timeout(self.shutdown_timeout, child.wait()).await {
            let status = status?;
            info!(%status, "Encoder exited");
            return Ok(Some(status));
        }

        warn!(
            timeout_ms = self.shutdown_timeout.as_millis() as u64,
            "Encoder did not exit in time, killing"
        );
        child.kill().await?;
        Ok(Some(child.wait().await?))
    }
}

#[async_trait]
impl AudioSink for EncoderSink {
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

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(SinkError::Closed)?;
        match stdin.write_all(&frame.to_le_bytes()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                // The encoder is gone; stop trying.
                guard.take();
                Err(SinkError::Closed)
            }
            Err(e) => Err(SinkError::Io(e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_command_is_rejected() {
        let result = EncoderSink::spawn(&[], Duration::from_secs(1));
        assert!(matches!(result, Err(AudioError::EmptyCommand)));
    }

    #[tokio::test]
    async fn pipes_pcm_and_shuts_down_cleanly() {
        let sink = EncoderSink::spawn(&command(&["cat"]), Duration::from_secs(5)).unwrap();
        let frame = AudioFrame::new(vec![0i16; 480], SAMPLE_RATE);
        sink.write(&frame).await.unwrap();

        let status = sink.shutdown().await.unwrap();
        assert!(status.is_some_and(|s| s.success()));

        // Second shutdown is a no-op, and writes now fail.
        assert!(sink.shutdown().await.unwrap().is_none());
        assert!(matches!(sink.write(&frame).await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn wrong_rate_is_rejected() {
        let sink = EncoderSink::spawn(&command(&["cat"]), Duration::from_secs(5)).unwrap();
        let frame = AudioFrame::new(vec![0i16; 80], 8_000);
        assert!(matches!(
            sink.write(&frame).await,
            Err(SinkError::Rejected(_))
        ));
        sink.shutdown().await.unwrap();
    }
}
