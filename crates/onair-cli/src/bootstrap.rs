//! Composition root: the only place concrete adapters meet the show.

use std::sync::Arc;

use anyhow::{Context, Result};
use onair_audio::{AudioBus, EncoderSink, KeepAliveSink, TelephonyBridge};
use onair_core::{
    AudioSink, ChannelEmitter, InterruptPublisher, ShowEvent, ShowEventEmitter, SpeechSynthesizer,
    TextGenerator, Transcriber,
};
use onair_openai::OpenAiClient;
use onair_show::{InterruptSender, Orchestrator, agents_from_settings, interrupt_channel};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ShowFile;

/// What to attach besides the telephony bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub preview: bool,
    pub seed: Option<u64>,
}

/// A composed show, ready to run.
pub struct ShowRuntime {
    pub orchestrator: Orchestrator,
    pub bus: Arc<AudioBus>,
    pub bridge: Arc<TelephonyBridge>,
    pub interrupts: InterruptSender,
    pub events: mpsc::UnboundedReceiver<ShowEvent>,
    pub outputs: Outputs,
}

impl ShowRuntime {
    /// Publisher handle for adapters outside the show (HTTP, feeds).
    pub fn publisher(&self) -> Arc<dyn InterruptPublisher> {
        Arc::new(self.interrupts.clone())
    }
}

/// Sinks attached to the bus. The bus only holds weak references, so these
/// must outlive the show.
pub struct Outputs {
    bus: Arc<AudioBus>,
    sinks: Vec<Arc<dyn AudioSink>>,
    encoder: Option<(Arc<EncoderSink>, Arc<KeepAliveSink>)>,
}

impl Outputs {
    /// Detach every sink and let the encoder drain.
    pub async fn close(mut self) {
        for sink in self.sinks.drain(..) {
            self.bus.deregister(&sink);
        }
        if let Some((encoder, keepalive)) = self.encoder.take() {
            keepalive.stop();
            match encoder.shutdown().await {
                Ok(Some(status)) => info!(%status, "Encoder stopped"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Encoder did not stop cleanly"),
            }
        }
    }
}

/// Wire one OpenAI-compatible client into every collaborator slot.
pub fn compose_with_openai(file: &ShowFile, options: OutputOptions) -> Result<ShowRuntime> {
    let client = OpenAiClient::new(file.openai.clone()).context("could not build HTTP client")?;
    info!(
        base_url = %file.openai.base_url,
        chat_model = %file.openai.chat_model,
        speech_model = %file.openai.speech_model,
        "Model endpoint configured"
    );
    let client = Arc::new(client);
    compose(file, options, client.clone(), client.clone(), client)
}

/// Build the bus, outputs, bridge, agents and orchestrator.
///
/// Requires a Tokio runtime: sinks and keep-alive start their own tasks.
pub fn compose(
    file: &ShowFile,
    options: OutputOptions,
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn Transcriber>,
) -> Result<ShowRuntime> {
    let settings = &file.show;
    let bus = Arc::new(AudioBus::with_queue_capacity(
        settings.output.sink_queue_capacity,
    ));
    let (channel_emitter, events) = ChannelEmitter::channel();
    let emitter: Arc<dyn ShowEventEmitter> = Arc::new(channel_emitter);
    let (interrupts, queue) = interrupt_channel(settings.ad_lib.clone());
    let publisher: Arc<dyn InterruptPublisher> = Arc::new(interrupts.clone());

    let mut sinks: Vec<Arc<dyn AudioSink>> = Vec::new();

    let bridge = Arc::new(TelephonyBridge::new(
        settings.telephony.clone(),
        Arc::clone(&bus),
        publisher,
        transcriber,
        Arc::clone(&emitter),
    ));
    sinks.push(bridge.clone());

    let encoder = if settings.output.encoder_command.is_empty() {
        None
    } else {
        let encoder = Arc::new(
            EncoderSink::spawn(
                &settings.output.encoder_command,
                settings.output.shutdown_timeout(),
            )
            .context("could not start the encoder")?,
        );
        let keepalive = Arc::new(KeepAliveSink::spawn(
            encoder.clone(),
            settings.output.keepalive_interval(),
        ));
        sinks.push(keepalive.clone());
        Some((encoder, keepalive))
    };

    if options.preview {
        sinks.push(preview_sink()?);
    }

    for sink in &sinks {
        bus.register(sink);
    }

    let agents = agents_from_settings(settings, &generator, &synthesizer, &emitter);
    let mut orchestrator = Orchestrator::new(settings, agents, Arc::clone(&bus), queue, emitter)?;
    if let Some(seed) = options.seed {
        orchestrator = orchestrator.with_seed(seed);
    }

    Ok(ShowRuntime {
        orchestrator,
        bus: Arc::clone(&bus),
        bridge,
        interrupts,
        events,
        outputs: Outputs {
            bus,
            sinks,
            encoder,
        },
    })
}

#[cfg(feature = "local-playback")]
fn preview_sink() -> Result<Arc<dyn AudioSink>> {
    let sink = onair_audio::PreviewSink::spawn().context("could not open the output device")?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "local-playback"))]
fn preview_sink() -> Result<Arc<dyn AudioSink>> {
    anyhow::bail!("--preview needs a build with the `local-playback` feature")
}
