//! A carrier talking to a real server over WebSocket.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use onair_audio::{ChannelSink, TelephonyBridge};
use onair_axum::serve;
use onair_core::{AudioSink, SAMPLE_RATE};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;

use common::{Fixture, RecordingPublisher, fixture};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(fx: &Fixture) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, fx.state.clone(), shutdown.clone()));
    (addr, shutdown)
}

fn text(value: &Value) -> Message {
    Message::Text(value.to_string().into())
}

fn start_event(sid: &str) -> Value {
    json!({
        "event": "start",
        "streamSid": sid,
        "start": { "streamSid": sid, "callSid": "CA1" }
    })
}

async fn wait_for_calls(bridge: &TelephonyBridge, expected: usize) {
    timeout(WAIT, async {
        while bridge.active_calls() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("active calls never reached {expected}"));
}

#[tokio::test]
async fn call_gets_outbound_frames_and_ends_on_stop() {
    let fx = fixture(RecordingPublisher::default());
    let (addr, _shutdown) = start_server(&fx).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/telephony/stream"))
        .await
        .unwrap();
    ws.send(text(&json!({ "event": "connected", "protocol": "Call" })))
        .await
        .unwrap();
    ws.send(text(&start_event("MZ1"))).await.unwrap();

    let frame = timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(body))) => {
                    let value: Value = serde_json::from_str(body.as_str()).unwrap();
                    if value["event"] == "media" {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("socket closed early: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(frame["streamSid"], "MZ1");
    let payload = STANDARD
        .decode(frame["media"]["payload"].as_str().unwrap())
        .unwrap();
    // 20 ms of 8 kHz mu-law silence.
    assert_eq!(payload.len(), 160);
    assert!(payload.iter().all(|&b| b == 0xFF));
    assert_eq!(fx.bridge.active_calls(), 1);

    ws.send(text(&json!({ "event": "stop", "streamSid": "MZ1" })))
        .await
        .unwrap();
    wait_for_calls(&fx.bridge, 0).await;
}

#[tokio::test]
async fn caller_audio_reaches_other_sinks_only() {
    let fx = fixture(RecordingPublisher::default());
    let (tap, mut tap_rx) = ChannelSink::new("tap");
    let tap: Arc<dyn AudioSink> = Arc::new(tap);
    fx.bus.register(&tap);
    let (addr, _shutdown) = start_server(&fx).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/telephony/stream"))
        .await
        .unwrap();
    ws.send(text(&start_event("MZ2"))).await.unwrap();
    ws.send(text(&json!({
        "event": "media",
        "streamSid": "MZ2",
        "media": { "track": "inbound", "payload": STANDARD.encode([0xFFu8; 160]) }
    })))
    .await
    .unwrap();

    let frame = timeout(WAIT, tap_rx.recv()).await.unwrap().unwrap();
    assert_eq!(frame.sample_rate(), SAMPLE_RATE);
    // 160 telephony samples upsampled three-fold.
    assert_eq!(frame.samples().len(), 480);
    assert!(fx.publisher.signals.lock().unwrap().is_empty());

    ws.close(None).await.unwrap();
    wait_for_calls(&fx.bridge, 0).await;
}

#[tokio::test]
async fn garbage_and_early_media_do_not_end_the_socket() {
    let fx = fixture(RecordingPublisher::default());
    let (addr, _shutdown) = start_server(&fx).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/telephony/stream"))
        .await
        .unwrap();
    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(text(&json!({
        "event": "media",
        "media": { "payload": STANDARD.encode([0xFFu8; 160]) }
    })))
    .await
    .unwrap();
    ws.send(text(&start_event("MZ3"))).await.unwrap();

    wait_for_calls(&fx.bridge, 1).await;
}

#[tokio::test]
async fn shutdown_closes_open_calls() {
    let fx = fixture(RecordingPublisher::default());
    let (addr, shutdown) = start_server(&fx).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/telephony/stream"))
        .await
        .unwrap();
    ws.send(text(&start_event("MZ4"))).await.unwrap();
    wait_for_calls(&fx.bridge, 1).await;

    shutdown.cancel();
    wait_for_calls(&fx.bridge, 0).await;

    let closed = timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
