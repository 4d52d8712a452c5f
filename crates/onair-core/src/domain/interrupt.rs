//! Interrupt signals: asynchronous events that preempt the current speaker.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an interrupt came from. Determines its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptSource {
    /// Injected breaking news. Every agent announces it.
    BreakingNews,
    /// A typed comment or a phone caller.
    ListenerInput,
    /// A trending topic with accompanying visual context.
    TrendInjection,
    /// One agent cutting in on another.
    PeerAgentAdLib,
}

impl InterruptSource {
    /// Numeric priority; higher preempts lower.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::BreakingNews => 3,
            Self::ListenerInput => 2,
            Self::TrendInjection => 1,
            Self::PeerAgentAdLib => 0,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BreakingNews => "breaking_news",
            Self::ListenerInput => "listener_input",
            Self::TrendInjection => "trend_injection",
            Self::PeerAgentAdLib => "peer_ad_lib",
        }
    }
}

impl PartialOrd for InterruptSource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InterruptSource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl fmt::Display for InterruptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An interrupt waiting to be consumed by the orchestrator.
///
/// Signals are ephemeral: the orchestrator takes each one at most once, at
/// the next poll point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptSignal {
    pub source: InterruptSource,
    /// Free text from the producer (headline, comment, transcript).
    ///
    /// Empty for a caller who has just started talking: the transcript
    /// follows in a second `ListenerInput` signal once the utterance ends.
    pub payload: String,
}

impl InterruptSignal {
    #[must_use]
    pub fn new(source: InterruptSource, payload: impl Into<String>) -> Self {
        Self {
            source,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn breaking_news(headline: impl Into<String>) -> Self {
        Self::new(InterruptSource::BreakingNews, headline)
    }

    #[must_use]
    pub fn listener(text: impl Into<String>) -> Self {
        Self::new(InterruptSource::ListenerInput, text)
    }

    #[must_use]
    pub fn trend(topic: impl Into<String>) -> Self {
        Self::new(InterruptSource::TrendInjection, topic)
    }

    #[must_use]
    pub fn ad_lib() -> Self {
        Self::new(InterruptSource::PeerAgentAdLib, String::new())
    }

    /// A caller started speaking; no words are known yet.
    #[must_use]
    pub fn caller_speaking() -> Self {
        Self::new(InterruptSource::ListenerInput, String::new())
    }

    #[must_use]
    pub const fn priority(&self) -> u8 {
        self.source.priority()
    }

    /// True for the placeholder a caller's speech onset produces.
    #[must_use]
    pub fn awaiting_transcript(&self) -> bool {
        self.source == InterruptSource::ListenerInput && self.payload.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_matches_policy() {
        assert!(InterruptSource::BreakingNews > InterruptSource::ListenerInput);
        assert!(InterruptSource::ListenerInput > InterruptSource::TrendInjection);
        assert!(InterruptSource::TrendInjection > InterruptSource::PeerAgentAdLib);
    }

    #[test]
    fn caller_onset_awaits_transcript() {
        assert!(InterruptSignal::caller_speaking().awaiting_transcript());
        assert!(!InterruptSignal::listener("hello there").awaiting_transcript());
        assert!(!InterruptSignal::trend("").awaiting_transcript());
    }

    #[test]
    fn serializes_source_in_snake_case() {
        let json = serde_json::to_string(&InterruptSignal::breaking_news("x")).unwrap();
        assert!(json.contains("\"breaking_news\""), "{json}");
    }
}
