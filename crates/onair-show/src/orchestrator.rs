//! The on-air control loop.
//!
//! One task owns the [`ConversationSession`], picks speakers, streams their
//! units onto the [`AudioBus`] in real time and reacts to interrupts:
//!
//! ```text
//!   select speaker → acquire units → play (poll every tick) → advance
//!                          ▲                 │ interrupt
//!                          │                 ▼
//!                          └──────── handler turns
//! ```
//!
//! While a rotation turn plays, the next rotation speaker is already
//! generating (speculation). If the turn completes, its units are ready the
//! moment the current audio runs out; if an interrupt arrives first they are
//! thrown away unplayed.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use onair_audio::AudioBus;
use onair_core::{
    AudioFrame, ConversationSession, InterruptSignal, InterruptSource, PlaybackState,
    PromptTemplates, SAMPLE_RATE, ShowEvent, ShowEventEmitter, ShowSettings, SpeechUnit,
    TimingSettings, Turn, TurnOutcome, TurnReason, duration_to_samples, validate_settings,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentOutput, SpeakOutcome, SpeakRequest};
use crate::error::BuildError;
use crate::interrupts::{InterruptQueue, TranscriptWait};

/// An agent's `speak` running in the background.
struct PendingTurn {
    agent: usize,
    cancel: CancellationToken,
    rx: mpsc::Receiver<AgentOutput>,
    handle: JoinHandle<SpeakOutcome>,
}

struct TurnPlan {
    agent: usize,
    request: SpeakRequest,
    reason: TurnReason,
    /// Only signals above this priority may cut the turn short. `None`
    /// lets anything through, ad-libs included.
    floor: Option<u8>,
}

/// Why playback of a turn stopped.
enum Stop {
    /// The agent has nothing more to send.
    Drained,
    Interrupt(InterruptSignal),
    Watchdog,
    Shutdown,
}

enum TurnEnd {
    Finished(TurnOutcome),
    Interrupted(InterruptSignal),
    Shutdown,
}

/// Drives a show until its shutdown token is cancelled.
pub struct Orchestrator {
    agents: Vec<Arc<Agent>>,
    session: ConversationSession,
    bus: Arc<AudioBus>,
    queue: InterruptQueue,
    emitter: Arc<dyn ShowEventEmitter>,
    timing: TimingSettings,
    prompts: PromptTemplates,
    unit_buffer: usize,
    rng: StdRng,
    shutdown: CancellationToken,
    /// When the audio written to the bus so far finishes playing.
    playhead: Instant,
    speculation: Option<PendingTurn>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents.len())
            .field("session", &self.session)
            .field("speculating", &self.speculation.as_ref().map(|s| s.agent))
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        settings: &ShowSettings,
        agents: Vec<Arc<Agent>>,
        bus: Arc<AudioBus>,
        queue: InterruptQueue,
        emitter: Arc<dyn ShowEventEmitter>,
    ) -> Result<Self, BuildError> {
        validate_settings(settings)?;
        if agents.is_empty() {
            return Err(BuildError::NoAgents);
        }

        let mut session = ConversationSession::new();
        if let Some(limit) = settings.history_limit {
            session = session.with_history_limit(limit);
        }

        Ok(Self {
            agents,
            session,
            bus,
            queue,
            emitter,
            timing: settings.timing.clone(),
            prompts: settings.prompts.clone(),
            unit_buffer: settings.agent.unit_buffer.max(1),
            rng: StdRng::from_os_rng(),
            shutdown: CancellationToken::new(),
            playhead: Instant::now(),
            speculation: None,
        })
    }

    /// Make speaker picks reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Cancel this token to end the show after the current poll.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub const fn session(&self) -> &ConversationSession {
        &self.session
    }

    #[must_use]
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// Run the show. Returns the final session once shut down.
    pub async fn run(mut self) -> ConversationSession {
        info!(agents = self.agents.len(), "Show starting");
        self.session.set_running(true);
        self.playhead = Instant::now();

        while !self.shutdown.is_cancelled() {
            if let Some(signal) = self.queue.take() {
                // Anything generated ahead was written without this interrupt in view.
                self.discard_speculation().await;
                self.emitter.emit(ShowEvent::Interrupted {
                    agent_id: None,
                    source: signal.source,
                });
                if self.handle_interrupt(signal, None).await.is_break() {
                    break;
                }
                continue;
            }

            let speaker = self.session.current_speaker();
            let plan = TurnPlan {
                agent: speaker,
                request: SpeakRequest::Prompt(self.prompts.rotation.clone()),
                reason: TurnReason::Rotation,
                floor: None,
            };
            match self.play_turn(plan).await {
                TurnEnd::Finished(_) => self.session.advance(self.agents.len()),
                TurnEnd::Interrupted(signal) => {
                    if self.handle_interrupt(signal, Some(speaker)).await.is_break() {
                        break;
                    }
                }
                TurnEnd::Shutdown => break,
            }
        }

        self.discard_speculation().await;
        self.session.set_running(false);
        info!(turns = self.session.turns().len(), "Show stopped");
        self.session
    }

    // ── Interrupt handlers ─────────────────────────────────────────

    /// Run the handler for `signal`, then for anything that preempts it.
    async fn handle_interrupt(
        &mut self,
        signal: InterruptSignal,
        interrupted: Option<usize>,
    ) -> ControlFlow<()> {
        let mut next = Some((signal, interrupted));
        while let Some((signal, interrupted)) = next.take() {
            info!(source = %signal.source, "Handling interrupt");
            match self.run_handler(signal, interrupted).await {
                TurnEnd::Finished(_) => {}
                // Handler turns only yield to higher priorities, never to an ad-lib.
                TurnEnd::Interrupted(signal) => next = Some((signal, None)),
                TurnEnd::Shutdown => return ControlFlow::Break(()),
            }
        }
        ControlFlow::Continue(())
    }

    async fn run_handler(
        &mut self,
        signal: InterruptSignal,
        interrupted: Option<usize>,
    ) -> TurnEnd {
        let n = self.agents.len();
        let reason = TurnReason::for_source(signal.source);
        let floor = Some(signal.priority());

        let (order, prompt) = match signal.source {
            InterruptSource::BreakingNews => {
                let start = self.session.current_speaker();
                let order = (0..n).map(|k| (start + k) % n).collect();
                let prompt = PromptTemplates::render(&self.prompts.breaking_news, &signal.payload);
                (order, prompt)
            }
            InterruptSource::ListenerInput => {
                let text = if signal.awaiting_transcript() {
                    match self.wait_for_transcript().await {
                        TranscriptWait::Transcript(text) => text,
                        TranscriptWait::Preempted => {
                            let Some(urgent) = self.queue.take() else {
                                return TurnEnd::Finished(TurnOutcome::Completed);
                            };
                            info!(source = %urgent.source, "Caller held for a more urgent interrupt");
                            self.emitter.emit(ShowEvent::Interrupted {
                                agent_id: None,
                                source: urgent.source,
                            });
                            return TurnEnd::Interrupted(urgent);
                        }
                        TranscriptWait::TimedOut | TranscriptWait::Closed => {
                            info!("Caller said nothing usable, resuming");
                            return TurnEnd::Finished(TurnOutcome::Completed);
                        }
                    }
                } else {
                    signal.payload.trim().to_string()
                };
                self.session.append_listener(text.as_str());
                let who = self.rng.random_range(0..n);
                (vec![who], PromptTemplates::render(&self.prompts.listener, &text))
            }
            InterruptSource::TrendInjection => {
                self.emitter.emit(ShowEvent::VisualContext {
                    topic: signal.payload.clone(),
                });
                let first = self.rng.random_range(0..n);
                let order = if n > 1 {
                    vec![first, (first + 1) % n]
                } else {
                    vec![first]
                };
                (order, PromptTemplates::render(&self.prompts.trend, &signal.payload))
            }
            InterruptSource::PeerAgentAdLib => {
                let candidates: Vec<usize> = (0..n).filter(|&i| Some(i) != interrupted).collect();
                if candidates.is_empty() {
                    debug!("Nobody else to ad-lib");
                    return TurnEnd::Finished(TurnOutcome::Completed);
                }
                let who = candidates[self.rng.random_range(0..candidates.len())];
                (vec![who], PromptTemplates::render(&self.prompts.ad_lib, ""))
            }
        };

        for agent in order {
            let plan = TurnPlan {
                agent,
                request: SpeakRequest::Prompt(prompt.clone()),
                reason,
                floor,
            };
            match self.play_turn(plan).await {
                TurnEnd::Finished(_) => {}
                other => return other,
            }
        }
        TurnEnd::Finished(TurnOutcome::Completed)
    }

    async fn wait_for_transcript(&mut self) -> TranscriptWait {
        let shutdown = self.shutdown.clone();
        let timeout = self.timing.caller_transcript_timeout();
        tokio::select! {
            () = shutdown.cancelled() => TranscriptWait::Closed,
            text = self.queue.wait_for_transcript(timeout) => text,
        }
    }

    // ── Turns ──────────────────────────────────────────────────────

    async fn play_turn(&mut self, plan: TurnPlan) -> TurnEnd {
        let agent = Arc::clone(&self.agents[plan.agent]);
        info!(agent = %agent.id(), reason = ?plan.reason, "Turn started");
        self.emitter.emit(ShowEvent::TurnStarted {
            agent_id: agent.id().clone(),
            reason: plan.reason,
        });

        let PendingTurn {
            cancel,
            mut rx,
            handle,
            ..
        } = match self.take_speculation(plan.agent, plan.reason).await {
            Some(pending) => {
                debug!(agent = %agent.id(), "Using speculative units");
                pending
            }
            None => self.spawn_speak(plan.agent, plan.request, self.session.snapshot()),
        };

        let next = self.session.next_speaker(self.agents.len());
        let speculate = plan.reason == TurnReason::Rotation && next != plan.agent;

        let deadline = Instant::now() + self.timing.max_turn();
        let mut poll = tokio::time::interval(self.timing.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pad_at = self.playhead;
        let mut script: Option<String> = None;
        let mut played: Vec<String> = Vec::new();
        let mut started_speaking = false;

        let stop = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break Stop::Shutdown,
                () = sleep_until(deadline) => break Stop::Watchdog,
                _ = poll.tick() => {
                    if let Some(signal) = self.queue.poll(plan.floor) {
                        break Stop::Interrupt(signal);
                    }
                }
                output = rx.recv() => match output {
                    Some(AgentOutput::Script { text, .. }) => {
                        self.emitter.emit(ShowEvent::ScriptReady {
                            agent_id: agent.id().clone(),
                            text: text.clone(),
                        });
                        if speculate {
                            self.start_speculation(next, &agent, &text);
                        }
                        script = Some(text);
                    }
                    Some(AgentOutput::Unit(unit)) => {
                        if !started_speaking {
                            agent.set_state(PlaybackState::Speaking);
                            started_speaking = true;
                        }
                        match self.play_unit(&agent, &unit, deadline, &mut poll, plan.floor).await {
                            Ok(()) => played.push(unit.text().to_string()),
                            Err(stop) => break stop,
                        }
                        pad_at = self.playhead;
                    }
                    None => break Stop::Drained,
                },
                () = sleep_until(pad_at) => {
                    pad_at = self.insert_padding();
                }
            }
        };

        match stop {
            Stop::Drained => {
                let outcome = handle.await.unwrap_or(SpeakOutcome::Failed);
                agent.transition(PlaybackState::Speaking, PlaybackState::Idle);
                let said = match outcome {
                    SpeakOutcome::Completed => script.filter(|s| !s.is_empty()),
                    _ if !played.is_empty() => Some(played.join(" ")),
                    _ => None,
                };
                if let Some(text) = said {
                    self.session.append(agent.id(), text);
                }
                let turn_outcome = if outcome == SpeakOutcome::Completed {
                    TurnOutcome::Completed
                } else {
                    TurnOutcome::Failed
                };
                self.finish_turn(&agent, turn_outcome);
                TurnEnd::Finished(turn_outcome)
            }
            Stop::Interrupt(signal) => {
                info!(agent = %agent.id(), source = %signal.source, "Turn interrupted");
                agent.interrupt();
                cancel.cancel();
                self.discard_speculation().await;
                self.bus.clear();
                self.playhead = Instant::now();
                self.emitter.emit(ShowEvent::Interrupted {
                    agent_id: Some(agent.id().clone()),
                    source: signal.source,
                });
                self.finish_turn(&agent, TurnOutcome::Interrupted);
                TurnEnd::Interrupted(signal)
            }
            Stop::Watchdog => {
                warn!(
                    agent = %agent.id(),
                    limit_ms = self.timing.max_turn_ms,
                    "Turn watchdog expired"
                );
                cancel.cancel();
                agent.set_state(PlaybackState::Idle);
                self.finish_turn(&agent, TurnOutcome::TimedOut);
                TurnEnd::Finished(TurnOutcome::TimedOut)
            }
            Stop::Shutdown => {
                cancel.cancel();
                agent.set_state(PlaybackState::Idle);
                TurnEnd::Shutdown
            }
        }
    }

    fn finish_turn(&self, agent: &Agent, outcome: TurnOutcome) {
        debug!(agent = %agent.id(), ?outcome, "Turn finished");
        self.emitter.emit(ShowEvent::TurnFinished {
            agent_id: agent.id().clone(),
            outcome,
        });
    }

    /// Push one sentence onto the bus in real time, chunk by chunk.
    ///
    /// Each chunk is written `overlap` before the audio ahead of it runs
    /// out, so the next sentence is always queued slightly early.
    async fn play_unit(
        &mut self,
        agent: &Agent,
        unit: &SpeechUnit,
        deadline: Instant,
        poll: &mut Interval,
        floor: Option<u8>,
    ) -> Result<(), Stop> {
        if let Some(signal) = self.queue.poll(floor) {
            return Err(Stop::Interrupt(signal));
        }

        let chunk_samples = duration_to_samples(self.timing.chunk(), SAMPLE_RATE).max(1);
        let overlap = self.timing.overlap();

        for chunk in unit.chunks(chunk_samples) {
            loop {
                let due = self.playhead.checked_sub(overlap).unwrap_or(self.playhead);
                if Instant::now() >= due {
                    break;
                }
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => return Err(Stop::Shutdown),
                    () = sleep_until(deadline) => return Err(Stop::Watchdog),
                    _ = poll.tick() => {
                        if let Some(signal) = self.queue.poll(floor) {
                            return Err(Stop::Interrupt(signal));
                        }
                    }
                    () = sleep_until(due) => {}
                }
            }
            self.bus.write(&chunk);
            self.playhead = self.playhead.max(Instant::now()) + chunk.duration();
        }

        debug!(
            agent = %agent.id(),
            index = unit.sentence_index(),
            duration_ms = unit.duration_ms(),
            "Sentence played"
        );
        self.emitter.emit(ShowEvent::SentencePlayed {
            agent_id: agent.id().clone(),
            sentence_index: unit.sentence_index(),
            text: unit.text().to_string(),
            duration_ms: unit.duration_ms(),
        });
        Ok(())
    }

    /// Write one padding frame of silence; returns when the next is due.
    fn insert_padding(&mut self) -> Instant {
        let padding = self.timing.padding();
        self.bus.write(&AudioFrame::silence(padding));
        self.playhead = self.playhead.max(Instant::now()) + padding;
        let duration_ms = padding.as_millis() as u64;
        debug!(duration_ms, "Next unit not ready, padding");
        self.emitter.emit(ShowEvent::PaddingInserted { duration_ms });
        self.playhead
    }

    // ── Speculation ────────────────────────────────────────────────

    fn spawn_speak(&self, index: usize, request: SpeakRequest, history: Vec<Turn>) -> PendingTurn {
        let cancel = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(self.unit_buffer);
        let agent = Arc::clone(&self.agents[index]);
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { agent.speak(request, history, cancel, tx).await }
        });
        PendingTurn {
            agent: index,
            cancel,
            rx,
            handle,
        }
    }

    /// Start generating the next rotation turn, assuming `current` finishes
    /// saying `script`.
    fn start_speculation(&mut self, next: usize, current: &Agent, script: &str) {
        if let Some(stale) = self.speculation.take() {
            stale.cancel.cancel();
        }
        let mut history = self.session.snapshot();
        history.push(Turn::new(current.id().as_str(), script));
        debug!(agent = %self.agents[next].id(), "Speculating next turn");
        let request = SpeakRequest::Prompt(self.prompts.rotation.clone());
        self.speculation = Some(self.spawn_speak(next, request, history));
    }

    /// Hand over the speculation if it is for this rotation turn; discard it
    /// otherwise.
    async fn take_speculation(&mut self, agent: usize, reason: TurnReason) -> Option<PendingTurn> {
        if reason == TurnReason::Rotation
            && self.speculation.as_ref().is_some_and(|s| s.agent == agent)
        {
            return self.speculation.take();
        }
        self.discard_speculation().await;
        None
    }

    async fn discard_speculation(&mut self) {
        if let Some(pending) = self.speculation.take() {
            pending.cancel.cancel();
            drop(pending.rx);
            // Cancellation is observed at every await inside `speak`.
            let _ = pending.handle.await;
            debug!(agent = %self.agents[pending.agent].id(), "Speculation discarded");
        }
    }
}
