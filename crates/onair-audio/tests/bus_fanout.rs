//! Fan-out behaviour of the audio bus with several sinks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use onair_audio::AudioBus;
use onair_core::{AudioFrame, AudioSink, SAMPLE_RATE, SinkError};

struct RecordingSink {
    name: String,
    received: Mutex<Vec<i16>>,
    fail_every_write: bool,
    delay: Duration,
    clears: Mutex<u32>,
}

impl RecordingSink {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            received: Mutex::new(Vec::new()),
            fail_every_write: false,
            delay: Duration::ZERO,
            clears: Mutex::new(0),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_every_write: true,
            ..Arc::into_inner(Self::new(name)).unwrap()
        })
    }

    fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Arc::into_inner(Self::new(name)).unwrap()
        })
    }

    /// First sample of every frame received, in order.
    fn received(&self) -> Vec<i16> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, frame: &AudioFrame) -> Result<(), SinkError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.received.lock().unwrap().push(frame.samples()[0]);
        if self.fail_every_write {
            return Err(SinkError::Rejected("broken output".into()));
        }
        Ok(())
    }

    fn clear(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}

fn frame(marker: i16) -> AudioFrame {
    AudioFrame::new(vec![marker; 240], SAMPLE_RATE)
}

fn as_dyn(sink: &Arc<RecordingSink>) -> Arc<dyn AudioSink> {
    Arc::clone(sink) as Arc<dyn AudioSink>
}

#[tokio::test]
async fn every_sink_gets_every_frame_in_order_despite_failures() {
    let bus = AudioBus::new();
    let healthy = RecordingSink::new("healthy");
    let broken = RecordingSink::failing("broken");
    let other = RecordingSink::new("other");
    let sinks = [as_dyn(&healthy), as_dyn(&broken), as_dyn(&other)];
    for sink in &sinks {
        assert!(bus.register(sink));
    }

    for marker in 1..=10 {
        assert_eq!(bus.write(&frame(marker)), 3);
    }
    bus.flush().await;

    let expected: Vec<i16> = (1..=10).collect();
    assert_eq!(healthy.received(), expected);
    assert_eq!(broken.received(), expected);
    assert_eq!(other.received(), expected);
}

#[tokio::test(start_paused = true)]
async fn slow_sink_does_not_hold_back_fast_sink() {
    let bus = AudioBus::new();
    let fast = RecordingSink::new("fast");
    let slow = RecordingSink::slow("slow", Duration::from_secs(1));
    let (fast_dyn, slow_dyn) = (as_dyn(&fast), as_dyn(&slow));
    bus.register(&fast_dyn);
    bus.register(&slow_dyn);

    for marker in 1..=3 {
        bus.write(&frame(marker));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(fast.received(), vec![1, 2, 3]);
    assert!(slow.received().is_empty());

    bus.flush().await;
    assert_eq!(slow.received(), vec![1, 2, 3]);
}

#[tokio::test]
async fn clear_reaches_every_sink() {
    let bus = AudioBus::new();
    let a = RecordingSink::new("a");
    let b = RecordingSink::new("b");
    let (a_dyn, b_dyn) = (as_dyn(&a), as_dyn(&b));
    bus.register(&a_dyn);
    bus.register(&b_dyn);

    bus.clear();

    assert_eq!(*a.clears.lock().unwrap(), 1);
    assert_eq!(*b.clears.lock().unwrap(), 1);
}

#[tokio::test]
async fn deregistered_sink_stops_receiving() {
    let bus = AudioBus::new();
    let stays = RecordingSink::new("stays");
    let leaves = RecordingSink::new("leaves");
    let (stays_dyn, leaves_dyn) = (as_dyn(&stays), as_dyn(&leaves));
    bus.register(&stays_dyn);
    bus.register(&leaves_dyn);

    bus.write(&frame(1));
    bus.flush().await;
    assert!(bus.deregister(&leaves_dyn));
    bus.write(&frame(2));
    bus.flush().await;

    assert_eq!(stays.received(), vec![1, 2]);
    assert_eq!(leaves.received(), vec![1]);
    assert_eq!(bus.sink_names(), vec!["stays".to_string()]);
}
