//! Show events: the observer stream of everything that happens on air.
//!
//! Events are fire-and-forget. The orchestrator and telephony bridge emit
//! them through a [`ShowEventEmitter`](crate::ports::ShowEventEmitter); a UI,
//! a logger or a test can subscribe without the show knowing who listens.

use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, InterruptSource, PlaybackState};

/// Why a turn was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnReason {
    Rotation,
    BreakingNews,
    ListenerReply,
    TrendReaction,
    AdLib,
}

impl TurnReason {
    #[must_use]
    pub const fn for_source(source: InterruptSource) -> Self {
        match source {
            InterruptSource::BreakingNews => Self::BreakingNews,
            InterruptSource::ListenerInput => Self::ListenerReply,
            InterruptSource::TrendInjection => Self::TrendReaction,
            InterruptSource::PeerAgentAdLib => Self::AdLib,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Every sentence was played; the text joined the history.
    Completed,
    /// An interrupt cut the turn short; nothing joined the history.
    Interrupted,
    /// Generation or synthesis gave up and the fallback was spoken (or not).
    Failed,
    /// The watchdog ended the turn.
    TimedOut,
}

/// Something observable that happened during the show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShowEvent {
    TurnStarted {
        agent_id: AgentId,
        reason: TurnReason,
    },
    /// The full text of a turn is known (before any audio plays).
    ScriptReady {
        agent_id: AgentId,
        text: String,
    },
    AgentState {
        agent_id: AgentId,
        state: PlaybackState,
    },
    /// One sentence has been handed to the bus in full.
    SentencePlayed {
        agent_id: AgentId,
        sentence_index: usize,
        text: String,
        duration_ms: u64,
    },
    /// Silence was written because the next unit was not ready.
    PaddingInserted {
        duration_ms: u64,
    },
    Interrupted {
        agent_id: Option<AgentId>,
        source: InterruptSource,
    },
    /// A trend or topic card to show alongside the audio.
    VisualContext {
        topic: String,
    },
    TurnFinished {
        agent_id: AgentId,
        outcome: TurnOutcome,
    },
    /// A phone caller's utterance has been transcribed.
    CallerSpeech {
        stream_id: String,
        text: String,
    },
}

impl ShowEvent {
    /// Short name used as a tracing field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::ScriptReady { .. } => "script_ready",
            Self::AgentState { .. } => "agent_state",
            Self::SentencePlayed { .. } => "sentence_played",
            Self::PaddingInserted { .. } => "padding_inserted",
            Self::Interrupted { .. } => "interrupted",
            Self::VisualContext { .. } => "visual_context",
            Self::TurnFinished { .. } => "turn_finished",
            Self::CallerSpeech { .. } => "caller_speech",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = ShowEvent::PaddingInserted { duration_ms: 250 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "padding_inserted");
        assert_eq!(json["duration_ms"], 250);
    }

    #[test]
    fn reason_follows_interrupt_source() {
        assert_eq!(
            TurnReason::for_source(InterruptSource::TrendInjection),
            TurnReason::TrendReaction
        );
    }
}
