//! One on-air persona: a prompt goes in, ordered sentence units come out.
//!
//! [`Agent::speak`] runs generation, segmentation and synthesis and hands
//! the results to whoever is driving the turn over a bounded channel: one
//! [`AgentOutput::Script`] followed by one [`AgentOutput::Unit`] per
//! sentence, in order. It never touches the audio bus.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{StreamExt, stream};
use onair_core::{
    AgentId, AgentSettings, FailureKind, Operation, Persona, PersonaConfig, PlaybackCell,
    PlaybackState, ShowError, ShowEvent, ShowEventEmitter, ShowSettings, SpeechSynthesizer, SpeechUnit,
    TextGenerator, Turn, VoiceProfile,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::text;

/// What an agent is asked to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakRequest {
    /// Say exactly this.
    Text(String),
    /// Generate a line from this user prompt and the shared history.
    Prompt(String),
}

/// Message from an agent to the turn driver.
#[derive(Debug)]
pub enum AgentOutput {
    /// The full cleaned script, sent once before any unit.
    Script { text: String, fallback: bool },
    /// One synthesized sentence.
    Unit(SpeechUnit),
}

/// How a call to [`Agent::speak`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Every sentence was synthesized and handed over.
    Completed,
    /// Something failed and the fallback line was handed over instead.
    Fallback,
    /// Something failed and nothing more could be handed over.
    Failed,
    /// The cancellation token fired; units not yet handed over were dropped.
    Cancelled,
}

impl SpeakOutcome {
    /// True when the agent got to the end of what it meant to say.
    #[must_use]
    pub const fn completed(self) -> bool {
        matches!(self, Self::Completed | Self::Fallback)
    }
}

pub struct Agent {
    id: AgentId,
    persona: Persona,
    voice: VoiceProfile,
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: AgentSettings,
    state: PlaybackCell,
    current: Mutex<Option<CancellationToken>>,
    emitter: Arc<dyn ShowEventEmitter>,
}

impl Agent {
    pub fn new(
        config: &PersonaConfig,
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: AgentSettings,
        emitter: Arc<dyn ShowEventEmitter>,
    ) -> Self {
        Self {
            id: config.agent_id(),
            persona: config.persona(),
            voice: config.voice_profile(),
            generator,
            synthesizer,
            settings,
            state: PlaybackCell::new(),
            current: Mutex::new(None),
            emitter,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    #[must_use]
    pub const fn persona(&self) -> &Persona {
        &self.persona
    }

    #[must_use]
    pub const fn voice(&self) -> &VoiceProfile {
        &self.voice
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state.get()
    }

    /// Store `state`, reporting the change to observers.
    pub(crate) fn set_state(&self, state: PlaybackState) {
        if self.state.set(state) != state {
            self.emit_state(state);
        }
    }

    /// Move from `expected` to `next` only if nobody else moved the agent.
    pub(crate) fn transition(&self, expected: PlaybackState, next: PlaybackState) -> bool {
        let moved = self.state.transition(expected, next);
        if moved && expected != next {
            self.emit_state(next);
        }
        moved
    }

    fn emit_state(&self, state: PlaybackState) {
        debug!(agent = %self.id, ?state, "Agent state changed");
        self.emitter.emit(ShowEvent::AgentState {
            agent_id: self.id.clone(),
            state,
        });
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel whatever this agent is doing. Idempotent.
    pub fn interrupt(&self) {
        if let Some(token) = self.lock_current().as_ref() {
            token.cancel();
        }
        if self.state() != PlaybackState::Idle {
            self.set_state(PlaybackState::Interrupted);
        }
    }

    /// Ask the generator for a line, retrying transient failures.
    pub async fn generate_text(
        &self,
        prompt: &str,
        history: &[Turn],
        cancel: &CancellationToken,
    ) -> Result<String, ShowError> {
        let system_prompt = self.persona.system_prompt.as_str();
        self.with_retry(Operation::Generation, cancel, || {
            self.generator.generate(system_prompt, history, prompt)
        })
        .await
    }

    /// Synthesize one piece of text with this agent's voice, retrying
    /// transient failures. Empty audio counts as a transient failure.
    pub async fn synthesize(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<i16>, ShowError> {
        self.with_retry(Operation::Synthesis, cancel, || async {
            let samples = self.synthesizer.synthesize(text, &self.voice).await?;
            if samples.is_empty() {
                return Err(ShowError::synthesis("no audio returned", FailureKind::Transient));
            }
            Ok(samples)
        })
        .await
    }

    /// Produce a turn and stream it over `tx`.
    ///
    /// Returns as soon as `cancel` fires. A unit is only ever sent after
    /// every earlier sentence has been sent.
    pub async fn speak(
        &self,
        request: SpeakRequest,
        history: Vec<Turn>,
        cancel: CancellationToken,
        tx: mpsc::Sender<AgentOutput>,
    ) -> SpeakOutcome {
        *self.lock_current() = Some(cancel.clone());

        let outcome = self.speak_inner(request, &history, &cancel, &tx).await;

        // Whoever drives playback owns Speaking and Interrupted.
        self.transition(PlaybackState::Generating, PlaybackState::Idle);
        self.transition(PlaybackState::Synthesizing, PlaybackState::Idle);
        debug!(agent = %self.id, ?outcome, "Speak finished");
        outcome
    }

    async fn speak_inner(
        &self,
        request: SpeakRequest,
        history: &[Turn],
        cancel: &CancellationToken,
        tx: &mpsc::Sender<AgentOutput>,
    ) -> SpeakOutcome {
        if cancel.is_cancelled() {
            return SpeakOutcome::Cancelled;
        }
        self.set_state(PlaybackState::Generating);

        let (raw, mut fallback) = match request {
            SpeakRequest::Text(text) => (text, false),
            SpeakRequest::Prompt(prompt) => {
                match self.generate_text(&prompt, history, cancel).await {
                    Ok(text) => (text, false),
                    Err(e) if e.is_cancelled() => return SpeakOutcome::Cancelled,
                    Err(e) => {
                        warn!(agent = %self.id, error = %e, "Generation gave up, using fallback");
                        (self.settings.fallback_text.clone(), true)
                    }
                }
            }
        };

        let mut script = text::strip_markup(&raw);
        if script.is_empty() && !fallback {
            warn!(agent = %self.id, "Script empty after clean-up, using fallback");
            script = text::strip_markup(&self.settings.fallback_text);
            fallback = true;
        }
        let sentences = text::split_sentences(&script);
        info!(agent = %self.id, sentences = sentences.len(), fallback, "Script ready");

        self.transition(PlaybackState::Generating, PlaybackState::Synthesizing);
        let script_msg = AgentOutput::Script {
            text: script,
            fallback,
        };
        if !send(tx, cancel, script_msg).await {
            return SpeakOutcome::Cancelled;
        }

        let parallelism = self.settings.synthesis_parallelism.max(1);
        let mut units = stream::iter(sentences.into_iter().enumerate())
            .map(|(index, sentence)| async move {
                let spoken = text::speakable(&sentence);
                if spoken.is_empty() {
                    return (index, sentence, Ok(None));
                }
                (index, sentence, self.synthesize(&spoken, cancel).await.map(Some))
            })
            .buffered(parallelism);

        let mut sent = 0usize;
        let mut failure = None;
        while let Some((index, sentence, result)) = units.next().await {
            match result {
                Ok(Some(samples)) => {
                    let unit = SpeechUnit::new(sentence, samples, index);
                    if !send(tx, cancel, AgentOutput::Unit(unit)).await {
                        return SpeakOutcome::Cancelled;
                    }
                    sent += 1;
                }
                Ok(None) => debug!(agent = %self.id, index, "Stage direction only, skipped"),
                Err(e) if e.is_cancelled() => return SpeakOutcome::Cancelled,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(units);

        match failure {
            None if sent == 0 => {
                warn!(agent = %self.id, "Nothing speakable in script");
                SpeakOutcome::Failed
            }
            None if fallback => SpeakOutcome::Fallback,
            None => SpeakOutcome::Completed,
            Some(e) if sent > 0 || fallback => {
                warn!(agent = %self.id, sent, error = %e, "Synthesis gave up mid-turn");
                SpeakOutcome::Failed
            }
            Some(e) => {
                warn!(agent = %self.id, error = %e, "Synthesis gave up, using fallback");
                self.speak_fallback(cancel, tx).await
            }
        }
    }

    async fn speak_fallback(
        &self,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<AgentOutput>,
    ) -> SpeakOutcome {
        let line = text::strip_markup(&self.settings.fallback_text);
        match self.synthesize(&line, cancel).await {
            Ok(samples) => {
                if send(tx, cancel, AgentOutput::Unit(SpeechUnit::new(line, samples, 0))).await {
                    SpeakOutcome::Fallback
                } else {
                    SpeakOutcome::Cancelled
                }
            }
            Err(e) if e.is_cancelled() => SpeakOutcome::Cancelled,
            Err(e) => {
                warn!(agent = %self.id, error = %e, "Fallback synthesis failed");
                SpeakOutcome::Failed
            }
        }
    }

    /// Run `call` under the operation's timeout, retrying retryable errors
    /// with exponential backoff. Cancellation wins over everything.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: Operation,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, ShowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ShowError>>,
    {
        let limit = match operation {
            Operation::Generation => self.settings.generation_timeout(),
            Operation::Synthesis | Operation::Transcription => self.settings.synthesis_timeout(),
        };

        let mut attempt = 0u32;
        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ShowError::Cancelled),
                r = tokio::time::timeout(limit, call()) => {
                    r.unwrap_or_else(|_| Err(ShowError::timeout(operation, limit)))
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let delay = self.settings.retry_backoff() * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        agent = %self.id,
                        %operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ShowError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One agent per configured persona, all sharing the same collaborators.
pub fn agents_from_settings(
    settings: &ShowSettings,
    generator: &Arc<dyn TextGenerator>,
    synthesizer: &Arc<dyn SpeechSynthesizer>,
    emitter: &Arc<dyn ShowEventEmitter>,
) -> Vec<Arc<Agent>> {
    settings
        .personas
        .iter()
        .map(|persona| {
            Arc::new(Agent::new(
                persona,
                Arc::clone(generator),
                Arc::clone(synthesizer),
                settings.agent.clone(),
                Arc::clone(emitter),
            ))
        })
        .collect()
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("voice", &self.voice)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Send unless the turn is cancelled first. False means stop.
async fn send(
    tx: &mpsc::Sender<AgentOutput>,
    cancel: &CancellationToken,
    output: AgentOutput,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(output) => sent.is_ok(),
    }
}
