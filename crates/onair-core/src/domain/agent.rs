//! Agent identity, persona and playback state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Stable identifier of an agent (also its speaker id in the history).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who an agent is: display name and the system prompt that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    pub system_prompt: String,
}

/// Synthesis voice settings, passed verbatim to the synthesis port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProfile {
    /// Backend-specific voice identifier.
    pub voice: String,
    /// Speaking-rate multiplier (1.0 = normal).
    #[serde(default = "default_speed")]
    pub speed: f32,
}

const fn default_speed() -> f32 {
    1.0
}

impl VoiceProfile {
    #[must_use]
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            speed: 1.0,
        }
    }
}

// ── Playback state machine ─────────────────────────────────────────

/// Where an agent is in its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PlaybackState {
    /// Not involved in the current turn.
    Idle = 0,
    /// Waiting on the text generation call.
    Generating = 1,
    /// Waiting on the speech synthesis call.
    Synthesizing = 2,
    /// Its audio is on the bus. At most one agent at a time.
    Speaking = 3,
    /// Cancelled mid-turn; emits nothing further.
    Interrupted = 4,
}

impl PlaybackState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Generating,
            2 => Self::Synthesizing,
            3 => Self::Speaking,
            4 => Self::Interrupted,
            _ => Self::Idle,
        }
    }
}

/// Lock-free cell holding a [`PlaybackState`], shared between the agent and
/// whatever task is currently driving it.
#[derive(Debug, Clone)]
pub struct PlaybackCell(Arc<AtomicU8>);

impl PlaybackCell {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PlaybackState::Idle as u8)))
    }

    #[must_use]
    pub fn get(&self) -> PlaybackState {
        PlaybackState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store `state`, returning the previous one.
    pub fn set(&self, state: PlaybackState) -> PlaybackState {
        PlaybackState::from_u8(self.0.swap(state as u8, Ordering::SeqCst))
    }

    /// Store `next` only if the current state is `expected`.
    pub fn transition(&self, expected: PlaybackState, next: PlaybackState) -> bool {
        self.0
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

impl Default for PlaybackCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_starts_idle_and_swaps() {
        let cell = PlaybackCell::new();
        assert_eq!(cell.get(), PlaybackState::Idle);
        assert_eq!(cell.set(PlaybackState::Speaking), PlaybackState::Idle);
        assert_eq!(cell.get(), PlaybackState::Speaking);
    }

    #[test]
    fn transition_only_from_expected_state() {
        let cell = PlaybackCell::new();
        assert!(!cell.transition(PlaybackState::Speaking, PlaybackState::Interrupted));
        assert_eq!(cell.get(), PlaybackState::Idle);
        cell.set(PlaybackState::Speaking);
        assert!(cell.transition(PlaybackState::Speaking, PlaybackState::Interrupted));
        assert_eq!(cell.get(), PlaybackState::Interrupted);
    }

    #[test]
    fn clones_share_state() {
        let cell = PlaybackCell::new();
        let other = cell.clone();
        other.set(PlaybackState::Generating);
        assert_eq!(cell.get(), PlaybackState::Generating);
    }
}
