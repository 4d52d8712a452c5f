//! End-to-end behaviour of the telephony bridge against a fake carrier.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use onair_audio::codec::{self, MULAW_SILENCE};
use onair_audio::{AudioBus, CarrierCommand, ChannelSink, TelephonyBridge, VadState};
use onair_core::{
    AudioFrame, AudioSink, ChannelEmitter, InterruptPublisher, InterruptSignal, InterruptSource,
    SAMPLE_RATE, ShowError, ShowEvent, TelephonySettings, Transcriber,
};
use tokio::sync::mpsc;

struct ChannelPublisher(mpsc::UnboundedSender<InterruptSignal>);

impl InterruptPublisher for ChannelPublisher {
    fn publish(&self, signal: InterruptSignal) -> bool {
        self.0.send(signal).is_ok()
    }
}

struct FixedTranscriber {
    text: String,
    seen: Mutex<Vec<usize>>,
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String, ShowError> {
        assert_eq!(sample_rate, 8_000);
        self.seen.lock().unwrap().push(samples.len());
        Ok(self.text.clone())
    }
}

struct Harness {
    bridge: Arc<TelephonyBridge>,
    bus: Arc<AudioBus>,
    studio: mpsc::UnboundedReceiver<AudioFrame>,
    signals: mpsc::UnboundedReceiver<InterruptSignal>,
    events: mpsc::UnboundedReceiver<ShowEvent>,
    transcriber: Arc<FixedTranscriber>,
    _sinks: Vec<Arc<dyn AudioSink>>,
}

fn harness(settings: TelephonySettings) -> Harness {
    let bus = Arc::new(AudioBus::new());
    let (signal_tx, signals) = mpsc::unbounded_channel();
    let (emitter, events) = ChannelEmitter::channel();
    let transcriber = Arc::new(FixedTranscriber {
        text: "  what about the weather  ".into(),
        seen: Mutex::new(Vec::new()),
    });
    let bridge = Arc::new(TelephonyBridge::new(
        settings,
        Arc::clone(&bus),
        Arc::new(ChannelPublisher(signal_tx)),
        Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        Arc::new(emitter),
    ));

    let (studio_sink, studio) = ChannelSink::new("studio");
    let sinks: Vec<Arc<dyn AudioSink>> = vec![
        Arc::new(studio_sink),
        Arc::clone(&bridge) as Arc<dyn AudioSink>,
    ];
    for sink in &sinks {
        bus.register(sink);
    }

    Harness {
        bridge,
        bus,
        studio,
        signals,
        events,
        transcriber,
        _sinks: sinks,
    }
}

fn payload(sample: i16) -> String {
    STANDARD.encode(codec::encode(&[sample; 160]))
}

fn media_bytes(command: &CarrierCommand) -> Option<Vec<u8>> {
    match command {
        CarrierCommand::Media { media, .. } => Some(STANDARD.decode(&media.payload).unwrap()),
        CarrierCommand::Clear { .. } => None,
    }
}

#[tokio::test(start_paused = true)]
async fn idle_call_streams_silence_every_frame() {
    let h = harness(TelephonySettings::default());
    let (tx, mut rx) = mpsc::channel(16);
    let _call = h.bridge.start_call("MZ1", tx);

    for _ in 0..5 {
        let command = rx.recv().await.unwrap();
        let bytes = media_bytes(&command).expect("media message");
        assert_eq!(bytes.len(), 160);
        assert!(bytes.iter().all(|&b| b == MULAW_SILENCE));
    }
    assert_eq!(h.bridge.active_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn show_audio_reaches_the_caller_and_clear_flushes_it() {
    let h = harness(TelephonySettings::default());
    let (tx, mut rx) = mpsc::channel(64);
    let _call = h.bridge.start_call("MZ1", tx);

    // 20 ms of show audio at 24 kHz becomes one 160 byte telephony frame.
    let frame = AudioFrame::new(vec![8_000; 480], SAMPLE_RATE);
    h.bridge.write(&frame).await.unwrap();

    let mut heard = false;
    for _ in 0..5 {
        let bytes = media_bytes(&rx.recv().await.unwrap()).unwrap();
        if bytes.iter().any(|&b| b != MULAW_SILENCE) {
            heard = true;
            break;
        }
    }
    assert!(heard, "show audio never reached the call");

    for _ in 0..10 {
        h.bridge.write(&frame).await.unwrap();
    }
    h.bridge.clear();
    let mut cleared = false;
    for _ in 0..20 {
        if matches!(rx.recv().await.unwrap(), CarrierCommand::Clear { ref stream_sid } if stream_sid == "MZ1")
        {
            cleared = true;
            break;
        }
    }
    assert!(cleared, "no clear command sent");

    // Nothing queued before the clear is played afterwards.
    let bytes = media_bytes(&rx.recv().await.unwrap()).unwrap();
    assert!(bytes.iter().all(|&b| b == MULAW_SILENCE));
}

#[tokio::test(start_paused = true)]
async fn caller_speech_interrupts_then_delivers_transcript() {
    let mut h = harness(TelephonySettings::default());
    let (tx, _rx) = mpsc::channel(1024);
    let mut call = h.bridge.start_call("MZ1", tx);

    let loud = payload(8_000);
    assert!(call.handle_media(&loud));
    assert!(call.handle_media(&loud));
    assert!(h.signals.try_recv().is_err());
    assert!(call.handle_media(&loud));
    assert_eq!(call.vad_state(), VadState::Speaking);

    let first = h.signals.recv().await.unwrap();
    assert_eq!(first.source, InterruptSource::ListenerInput);
    assert!(first.awaiting_transcript());

    // 600 ms of speech in total, then enough silence to end the segment.
    for _ in 0..27 {
        assert!(call.handle_media(&loud));
    }
    let quiet = payload(0);
    for _ in 0..40 {
        assert!(call.handle_media(&quiet));
    }
    assert_eq!(call.vad_state(), VadState::Silence);

    let second = h.signals.recv().await.unwrap();
    assert_eq!(second, InterruptSignal::listener("what about the weather"));
    assert_eq!(h.transcriber.seen.lock().unwrap().as_slice(), &[30 * 160]);

    let event = h.events.recv().await.unwrap();
    assert_eq!(
        event,
        ShowEvent::CallerSpeech {
            stream_id: "MZ1".into(),
            text: "what about the weather".into(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn caller_audio_goes_to_other_sinks_only() {
    let mut h = harness(TelephonySettings::default());
    let (tx, mut rx) = mpsc::channel(1024);
    let mut call = h.bridge.start_call("MZ1", tx);

    call.handle_media(&payload(4_000));
    h.bus.flush().await;

    let frame = h.studio.recv().await.unwrap();
    assert_eq!(frame.sample_rate(), SAMPLE_RATE);
    assert_eq!(frame.len(), 480);
    assert!(!frame.is_silent());

    // The caller never hears themselves back.
    for _ in 0..5 {
        let bytes = media_bytes(&rx.recv().await.unwrap()).unwrap();
        assert!(bytes.iter().all(|&b| b == MULAW_SILENCE));
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_garbage_ends_the_call() {
    let settings = TelephonySettings {
        max_codec_failures: 3,
        ..TelephonySettings::default()
    };
    let h = harness(settings);
    let (tx, _rx) = mpsc::channel(16);
    let mut call = h.bridge.start_call("MZ1", tx);

    assert!(call.handle_media("%%%"));
    assert!(call.handle_media("%%%"));
    assert!(!call.handle_media("%%%"));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handler_stops_the_pump() {
    let h = harness(TelephonySettings::default());
    let (tx, mut rx) = mpsc::channel(16);
    let call = h.bridge.start_call("MZ1", tx);
    assert!(rx.recv().await.is_some());

    drop(call);
    assert_eq!(h.bridge.active_calls(), 0);

    // Drain whatever was in flight; the channel then closes.
    while rx.recv().await.is_some() {}
}

#[tokio::test(start_paused = true)]
async fn restarted_stream_survives_the_old_handler() {
    let h = harness(TelephonySettings::default());
    let (old_tx, _old_rx) = mpsc::channel(16);
    let old = h.bridge.start_call("MZ1", old_tx);
    let (new_tx, mut new_rx) = mpsc::channel(16);
    let _new = h.bridge.start_call("MZ1", new_tx);

    drop(old);
    assert_eq!(h.bridge.active_calls(), 1);
    assert!(new_rx.recv().await.is_some());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(new_rx.recv().await.is_some());
}
