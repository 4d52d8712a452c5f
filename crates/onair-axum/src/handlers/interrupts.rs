//! `POST /interrupts`: news desks, chat relays and trend feeds push text in.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use onair_core::{InterruptSignal, InterruptSource};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    BreakingNews,
    Listener,
    Trend,
}

#[derive(Debug, Deserialize)]
pub struct InterruptRequest {
    pub kind: InterruptKind,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct InterruptAccepted {
    pub source: InterruptSource,
    pub priority: u8,
}

pub async fn publish(
    State(state): State<AppState>,
    Json(request): Json<InterruptRequest>,
) -> Result<(StatusCode, Json<InterruptAccepted>), HttpError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(HttpError::BadRequest("text must not be empty".into()));
    }

    let signal = match request.kind {
        InterruptKind::BreakingNews => InterruptSignal::breaking_news(text),
        InterruptKind::Listener => InterruptSignal::listener(text),
        InterruptKind::Trend => InterruptSignal::trend(text),
    };
    let accepted = InterruptAccepted {
        source: signal.source,
        priority: signal.priority(),
    };

    if !state.interrupts.publish(signal) {
        return Err(HttpError::ServiceUnavailable("the show has ended".into()));
    }
    info!(source = %accepted.source, "Interrupt accepted over HTTP");
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
