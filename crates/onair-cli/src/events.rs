//! Show events to logs and, optionally, stdout.

use onair_core::ShowEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drain `events` until every emitter is gone.
///
/// Lifecycle events are logged at `info`, the per-sentence stream at
/// `debug`. With `print_json` each event is also written to stdout as one
/// JSON line for overlays and dashboards.
pub async fn log_events(mut events: mpsc::UnboundedReceiver<ShowEvent>, print_json: bool) {
    while let Some(event) = events.recv().await {
        if print_json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Could not serialize show event"),
            }
        }
        log_event(&event);
    }
}

fn log_event(event: &ShowEvent) {
    match event {
        ShowEvent::TurnStarted { agent_id, reason } => {
            info!(agent = %agent_id, ?reason, "Turn started");
        }
        ShowEvent::TurnFinished { agent_id, outcome } => {
            info!(agent = %agent_id, ?outcome, "Turn finished");
        }
        ShowEvent::Interrupted { agent_id, source } => {
            info!(agent = ?agent_id.as_ref().map(ToString::to_string), %source, "Interrupted");
        }
        ShowEvent::CallerSpeech { stream_id, text } => {
            info!(%stream_id, %text, "Caller");
        }
        ShowEvent::VisualContext { topic } => info!(%topic, "Visual context"),
        ShowEvent::SentencePlayed {
            agent_id,
            sentence_index,
            text,
            ..
        } => debug!(agent = %agent_id, sentence_index, %text, "On air"),
        other => debug!(event = other.name(), "Show event"),
    }
}
