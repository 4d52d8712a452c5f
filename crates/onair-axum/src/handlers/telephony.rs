//! Carrier media-stream endpoint.
//!
//! `GET /telephony/stream` upgrades to a WebSocket speaking the carrier's
//! JSON protocol. One socket carries one call:
//!
//! | Direction | Event | Handling |
//! |---|---|---|
//! | in | `connected` | logged |
//! | in | `start` | call registered with the bridge |
//! | in | `media` | decoded, broadcast to the show, fed to caller VAD |
//! | in | `stop`, close | call released |
//! | out | `media` | one frame of show audio, or silence |
//! | out | `clear` | carrier drops queued playback after an interrupt |

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use onair_audio::{CallHandler, CarrierCommand, CarrierEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Outbound commands buffered per socket.
const OUTBOUND_CAPACITY: usize = 64;

/// `GET /telephony/stream`
pub async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<CarrierCommand>(OUTBOUND_CAPACITY);
    debug!("Carrier socket opened");

    let mut egress = tokio::spawn(async move {
        while let Some(command) = out_rx.recv().await {
            let text = match command.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Could not encode carrier command");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut call: Option<CallHandler> = None;
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => break,
            _ = &mut egress => {
                debug!("Carrier socket no longer writable");
                break;
            }
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if !on_text(&state, text.as_str(), &mut call, &out_tx) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let stream_id = call.as_ref().map(|c| c.stream_id().to_string());
    drop(call);
    egress.abort();
    info!(stream_id = ?stream_id, "Carrier socket closed");
}

/// Act on one carrier message. Returns `false` to hang up.
fn on_text(
    state: &AppState,
    text: &str,
    call: &mut Option<CallHandler>,
    outbound: &mpsc::Sender<CarrierCommand>,
) -> bool {
    let event = match CarrierEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Unparseable carrier message, ignored");
            return true;
        }
    };

    match event {
        CarrierEvent::Connected { protocol } => debug!(?protocol, "Carrier connected"),
        CarrierEvent::Start { start, .. } => {
            let handler = state.bridge.start_call(start.stream_sid, outbound.clone());
            if let Some(previous) = call.replace(handler) {
                debug!(stream_id = %previous.stream_id(), "Second start on one socket");
            }
        }
        CarrierEvent::Media { media, .. } => {
            // Some carriers echo our own audio back on an outbound track.
            if media.track.as_deref().is_some_and(|track| track != "inbound") {
                return true;
            }
            match call.as_mut() {
                Some(call) => return call.handle_media(&media.payload),
                None => debug!("Media before start, ignored"),
            }
        }
        CarrierEvent::Mark { mark, .. } => debug!(name = %mark.name, "Carrier mark"),
        CarrierEvent::Stop { .. } => {
            info!("Carrier ended the stream");
            return false;
        }
        CarrierEvent::Unknown => {}
    }
    true
}
