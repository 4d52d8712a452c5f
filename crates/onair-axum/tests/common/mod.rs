#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use onair_audio::{AudioBus, TelephonyBridge};
use onair_core::{
    AudioSink, InterruptPublisher, InterruptSignal, NoopEmitter, ShowError, TelephonySettings,
    Transcriber,
};
use onair_axum::AppState;

/// Records published signals; refuses them once closed.
#[derive(Default)]
pub struct RecordingPublisher {
    pub signals: Mutex<Vec<InterruptSignal>>,
    pub closed: bool,
}

impl InterruptPublisher for RecordingPublisher {
    fn publish(&self, signal: InterruptSignal) -> bool {
        if self.closed {
            return false;
        }
        self.signals.lock().unwrap().push(signal);
        true
    }
}

pub struct SilentTranscriber;

#[async_trait]
impl Transcriber for SilentTranscriber {
    async fn transcribe(&self, _samples: &[i16], _sample_rate: u32) -> Result<String, ShowError> {
        Ok(String::new())
    }
}

pub struct Fixture {
    pub state: AppState,
    pub bridge: Arc<TelephonyBridge>,
    pub bus: Arc<AudioBus>,
    pub publisher: Arc<RecordingPublisher>,
    /// Keeps the bridge registered; the bus only holds weak references.
    pub bridge_sink: Arc<dyn AudioSink>,
}

pub fn fixture(publisher: RecordingPublisher) -> Fixture {
    let bus = Arc::new(AudioBus::new());
    let publisher = Arc::new(publisher);
    let interrupts: Arc<dyn InterruptPublisher> = publisher.clone();
    let bridge = Arc::new(TelephonyBridge::new(
        TelephonySettings::default(),
        Arc::clone(&bus),
        Arc::clone(&interrupts),
        Arc::new(SilentTranscriber),
        Arc::new(NoopEmitter::new()),
    ));
    let bridge_sink: Arc<dyn AudioSink> = bridge.clone();
    bus.register(&bridge_sink);

    Fixture {
        state: AppState::new(Arc::clone(&bridge), Arc::clone(&bus), interrupts),
        bridge,
        bus,
        publisher,
        bridge_sink,
    }
}
