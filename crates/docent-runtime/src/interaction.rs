//! Interaction state machine – one conversation at one exhibit.
//!
//! ```text
//! Introducing ─► Responding ─► AwaitingInput ─┬─► Responding   (question answered)
//!                                             ├─► Exit(Stop)
//!                                             ├─► Exit(MoveOn)
//!                                             └─► Exit(TimedOut)
//! ```
//!
//! An [`AttentionMonitor`] runs for the whole conversation.  Each visit to
//! `Responding` reads the freshest sample from the session log to choose the
//! response tier.  The monitor is cancelled and joined before
//! [`Interaction::run`] returns, whichever exit was taken.

use std::sync::Arc;
use std::time::Duration;

use docent_hal::{Actuation, Perception, Voice};
use docent_memory::AttentionLog;
use docent_services::Transcriber;
use docent_types::{AttentionTier, ExitSignal, Exhibit, TourError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dialogue::{Dialogue, UNAVAILABLE_REPLY};
use crate::monitor::{AttentionMonitor, MonitorConfig, MonitorStop};
use crate::phrases::{self, speak};

// ─────────────────────────────────────────────────────────────────────────────
// Pure helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Detect an exit request in a transcript.
///
/// A word equal to `stop` once case and surrounding punctuation are removed
/// ends the visit; the phrase `move on` anywhere (any case) moves to the next
/// exhibit.  `stop` wins when both are present.
pub fn parse_exit_intent(utterance: &str) -> Option<ExitSignal> {
    let lowered = utterance.to_lowercase();
    let says_stop = lowered
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| c.is_ascii_punctuation()))
        .any(|token| token == "stop");
    if says_stop {
        Some(ExitSignal::Stop)
    } else if lowered.contains("move on") {
        Some(ExitSignal::MoveOn)
    } else {
        None
    }
}

/// Tier for the most recent sample in `log`.
pub fn select_tier(log: &AttentionLog) -> AttentionTier {
    AttentionTier::from_attention(log.latest().map(|s| s.attention))
}

/// What to say in `Responding`.  `answered` is `true` once at least one
/// question has been answered at this exhibit.
pub fn tier_lines(tier: AttentionTier, exhibit: &Exhibit, answered: bool) -> Vec<String> {
    match (tier, answered) {
        (AttentionTier::HighInterest, false) => vec![
            phrases::HIGH_INTEREST_INTRO.to_string(),
            exhibit.detailed_description.clone(),
            phrases::INVITE_QUESTIONS.to_string(),
        ],
        (AttentionTier::HighInterest, true) => vec![
            phrases::HIGH_INTEREST_AGAIN.to_string(),
            exhibit.follow_up.clone(),
        ],
        (AttentionTier::Neutral, true) => vec![phrases::NEUTRAL_AGAIN.to_string()],
        (AttentionTier::Neutral | AttentionTier::NeutralDefault, _) => {
            vec![phrases::NEUTRAL_INTRO.to_string()]
        }
        (AttentionTier::LowInterest, _) => vec![phrases::LOW_INTEREST.to_string()],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Introducing,
    Responding { answered: bool },
    AwaitingInput,
    Exit(ExitSignal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionConfig {
    /// Conversation length after which the next turn exits with
    /// [`ExitSignal::TimedOut`].
    pub timeout: Duration,
    /// Pause after a failed transcription before listening again.
    pub retry_pause: Duration,
    pub monitor: MonitorConfig,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            retry_pause: Duration::from_secs(1),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Result of one exhibit conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionReport {
    pub exit: ExitSignal,
    /// Questions forwarded to the dialogue service.
    pub questions: usize,
    /// Attention samples appended during this conversation.
    pub samples_recorded: usize,
    /// `None` when no monitor could be started.
    pub monitor: Option<MonitorStop>,
}

pub struct Interaction {
    actuation: Arc<dyn Actuation>,
    perception: Arc<dyn Perception>,
    voice: Arc<dyn Voice>,
    transcriber: Arc<dyn Transcriber>,
    dialogue: Arc<dyn Dialogue>,
    log: AttentionLog,
    config: InteractionConfig,
}

impl Interaction {
    pub fn new(
        actuation: Arc<dyn Actuation>,
        perception: Arc<dyn Perception>,
        voice: Arc<dyn Voice>,
        transcriber: Arc<dyn Transcriber>,
        dialogue: Arc<dyn Dialogue>,
        log: AttentionLog,
        config: InteractionConfig,
    ) -> Self {
        Self {
            actuation,
            perception,
            voice,
            transcriber,
            dialogue,
            log,
            config,
        }
    }

    /// Hold the conversation at `exhibit` until an exit is reached.
    pub async fn run(&self, exhibit: &Exhibit) -> InteractionReport {
        info!(exhibit = exhibit.id, title = %exhibit.title, "interaction started");
        self.dialogue.reset().await;
        let before = self.log.len();

        let monitor = match AttentionMonitor::spawn(
            Arc::clone(&self.perception),
            Arc::clone(&self.actuation),
            &self.log,
            self.config.monitor.clone(),
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "continuing without attention monitor");
                None
            }
        };

        let (exit, questions) = self.converse(exhibit).await;

        let monitor = match monitor {
            Some(handle) => Some(handle.cancel().await),
            None => None,
        };
        let report = InteractionReport {
            exit,
            questions,
            samples_recorded: self.log.since(before).len(),
            monitor,
        };
        info!(
            exhibit = exhibit.id,
            exit = ?report.exit,
            questions = report.questions,
            samples = report.samples_recorded,
            "interaction finished"
        );
        report
    }

    async fn converse(&self, exhibit: &Exhibit) -> (ExitSignal, usize) {
        let deadline = Instant::now() + self.config.timeout;
        let mut questions = 0;
        let mut state = InteractionState::Introducing;
        loop {
            debug!(?state, "interaction state");
            state = match state {
                InteractionState::Introducing => {
                    speak(self.voice.as_ref(), &exhibit.description).await;
                    InteractionState::Responding { answered: false }
                }
                InteractionState::Responding { answered } => {
                    let tier = select_tier(&self.log);
                    debug!(?tier, "response tier");
                    for line in tier_lines(tier, exhibit, answered) {
                        speak(self.voice.as_ref(), &line).await;
                    }
                    let hint = if answered {
                        phrases::EXIT_HINT_AGAIN
                    } else {
                        phrases::EXIT_HINT
                    };
                    speak(self.voice.as_ref(), hint).await;
                    InteractionState::AwaitingInput
                }
                InteractionState::AwaitingInput => {
                    self.await_input(exhibit, deadline, &mut questions).await
                }
                InteractionState::Exit(signal) => return (signal, questions),
            };
        }
    }

    async fn await_input(
        &self,
        exhibit: &Exhibit,
        deadline: Instant,
        questions: &mut usize,
    ) -> InteractionState {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            info!("interaction deadline reached");
            return InteractionState::Exit(ExitSignal::TimedOut);
        }
        let heard = match tokio::time::timeout(remaining, self.transcriber.transcribe()).await {
            Ok(heard) => heard,
            Err(_) => {
                info!("interaction deadline reached while listening");
                return InteractionState::Exit(ExitSignal::TimedOut);
            }
        };

        let utterance = match heard {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                speak(self.voice.as_ref(), phrases::NOT_CAUGHT).await;
                return InteractionState::AwaitingInput;
            }
            Err(e) => {
                warn!(error = %e, "no usable transcript");
                let line = match e {
                    TourError::TranscriptionFailure(_) => phrases::TRANSCRIPTION_APOLOGY,
                    _ => phrases::NOT_CAUGHT,
                };
                speak(self.voice.as_ref(), line).await;
                tokio::time::sleep(self.config.retry_pause.min(remaining)).await;
                return InteractionState::AwaitingInput;
            }
        };

        speak(self.voice.as_ref(), phrases::THINKING).await;
        if let Some(exit) = parse_exit_intent(&utterance) {
            info!(?exit, %utterance, "exit requested");
            return InteractionState::Exit(exit);
        }

        *questions += 1;
        let answer = match self.dialogue.respond(&utterance, Some(exhibit)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "dialogue failed");
                UNAVAILABLE_REPLY.to_string()
            }
        };
        speak(self.voice.as_ref(), &answer).await;
        InteractionState::Responding { answered: true }
    }
}
