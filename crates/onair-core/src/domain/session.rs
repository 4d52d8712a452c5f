//! Conversation session: the shared history of one show.

use serde::{Deserialize, Serialize};

use super::agent::AgentId;

/// Speaker id used for listener/caller lines in the history.
pub const LISTENER_SPEAKER: &str = "listener";

/// One completed line of the show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub speaker_id: String,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn new(speaker_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            text: text.into(),
        }
    }
}

/// Shared state of a running show.
///
/// Owned by the orchestrator and mutated only by it. Agents receive
/// [`snapshot`](Self::snapshot)s, so history is effectively append-only and
/// single-writer.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<Turn>,
    current_speaker: usize,
    running: bool,
    max_history: Option<usize>,
}

impl ConversationSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` turns in the prompt window (oldest dropped first).
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.max_history = Some(limit);
        self
    }

    /// Record a completed line. Only fully spoken text belongs here.
    pub fn append(&mut self, speaker: &AgentId, text: impl Into<String>) {
        self.append_raw(speaker.as_str(), text);
    }

    /// Record a listener/caller line.
    pub fn append_listener(&mut self, text: impl Into<String>) {
        self.append_raw(LISTENER_SPEAKER, text);
    }

    fn append_raw(&mut self, speaker: &str, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.turns.push(Turn::new(speaker, text));
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Copy of the prompt window, for handing to a generation task.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        let start = self
            .max_history
            .map_or(0, |limit| self.turns.len().saturating_sub(limit));
        self.turns[start..].to_vec()
    }

    #[must_use]
    pub const fn current_speaker(&self) -> usize {
        self.current_speaker
    }

    /// Move the speaker pointer round-robin over `agent_count` agents.
    pub const fn advance(&mut self, agent_count: usize) {
        if agent_count > 0 {
            self.current_speaker = (self.current_speaker + 1) % agent_count;
        }
    }

    /// Index that [`advance`](Self::advance) would move to.
    #[must_use]
    pub const fn next_speaker(&self, agent_count: usize) -> usize {
        if agent_count == 0 {
            0
        } else {
            (self.current_speaker + 1) % agent_count
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn set_running(&mut self, running: bool) {
        self.running = running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_round_robin() {
        let mut session = ConversationSession::new();
        assert_eq!(session.next_speaker(3), 1);
        session.advance(3);
        session.advance(3);
        assert_eq!(session.current_speaker(), 2);
        session.advance(3);
        assert_eq!(session.current_speaker(), 0);
    }

    #[test]
    fn blank_text_is_not_recorded() {
        let mut session = ConversationSession::new();
        session.append(&AgentId::new("a"), "   ");
        assert!(session.turns().is_empty());
    }

    #[test]
    fn snapshot_respects_history_limit() {
        let mut session = ConversationSession::new().with_history_limit(2);
        let host = AgentId::new("host");
        session.append(&host, "one");
        session.append(&host, "two");
        session.append_listener("three");
        let window = session.snapshot();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].text, "two");
        assert_eq!(window[1].speaker_id, LISTENER_SPEAKER);
    }
}
