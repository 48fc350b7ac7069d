//! The intake controller
//!
//! Implements `FrameProcessor` and sits between the STT and TTS adapters
//! in the call chain. All phase transitions flow through the state store;
//! the controller itself only ever force-advances GREETING to INSURANCE
//! during one-shot initialization and CONFIRMATION to COMPLETED during the
//! completion handoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use intake_agent_core::{
    AddressValidator, CallSession, ChoiceClassifier, ConfirmationSender, Frame, FrameProcessor,
    IntakePhase, ProcessorContext, ProviderDirectory, Result, Speaker,
};
use intake_agent_handlers::{
    prompts, ContactPolicy, DemographicsHandler, InsuranceHandler, PhaseHandler,
    SchedulingHandler, SymptomHandler,
};
use intake_agent_state::StateStore;

use crate::segment::split_sentences;
use crate::tasks::TaskTracker;

const GREETING_PART_ONE: &str = "Hello! This is your clinic's automated appointment assistant.";
const GREETING_PART_TWO: &str = "I'm here to help you schedule your appointment today.";

const COMPLETION_RESPONSE: &str =
    "Your appointment has been scheduled. You'll receive a confirmation email shortly. \
     Thank you for calling. Goodbye!";

/// Consecutive identical responses tolerated before escalation
const MAX_SAME_RESPONSE: u32 = 2;

const DISPATCH_ATTEMPTS: u32 = 3;

/// External dependencies injected at call setup
pub struct ControllerDeps {
    pub store: Arc<dyn StateStore>,
    pub validator: Arc<dyn AddressValidator>,
    pub directory: Arc<dyn ProviderDirectory>,
    pub classifier: Option<Arc<dyn ChoiceClassifier>>,
    pub notifier: Arc<dyn ConfirmationSender>,
    pub contact_policy: ContactPolicy,
    /// Timeout for each collaborator call
    pub collaborator_timeout: Duration,
    /// One-time settle delay after warming the TTS engine
    pub tts_settle: Duration,
    /// Base delay for confirmation-dispatch retry backoff
    pub dispatch_backoff: Duration,
}

/// One handler object per logical workflow; two phases may share a
/// workflow, which is what lets sub-step cursors survive the phase change
struct Workflows {
    insurance: Arc<dyn PhaseHandler>,
    symptom: Arc<dyn PhaseHandler>,
    demographics: Arc<dyn PhaseHandler>,
    scheduling: Arc<dyn PhaseHandler>,
}

impl Workflows {
    fn for_phase(&self, phase: IntakePhase) -> Option<&Arc<dyn PhaseHandler>> {
        match phase {
            IntakePhase::Insurance => Some(&self.insurance),
            IntakePhase::ChiefComplaint => Some(&self.symptom),
            IntakePhase::Demographics | IntakePhase::ContactInfo => Some(&self.demographics),
            IntakePhase::ProviderSelection | IntakePhase::AppointmentScheduling => {
                Some(&self.scheduling)
            }
            _ => None,
        }
    }
}

#[derive(Default)]
struct Repetition {
    last_response: Option<String>,
    count: u32,
}

pub struct IntakeController {
    call_id: String,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn ConfirmationSender>,
    workflows: Workflows,
    tasks: TaskTracker,
    started: AtomicBool,
    speaking: AtomicBool,
    tts_warmed: AtomicBool,
    confirmation_dispatched: AtomicBool,
    repetition: Mutex<Repetition>,
    tts_settle: Duration,
    dispatch_backoff: Duration,
}

impl IntakeController {
    pub fn new(call_id: impl Into<String>, deps: ControllerDeps) -> Self {
        let call_id = call_id.into();
        let workflows = Workflows {
            insurance: Arc::new(InsuranceHandler::new(call_id.as_str(), deps.store.clone())),
            symptom: Arc::new(SymptomHandler::new(call_id.as_str(), deps.store.clone())),
            demographics: Arc::new(DemographicsHandler::new(
                call_id.as_str(),
                deps.store.clone(),
                deps.validator,
                deps.collaborator_timeout,
                deps.contact_policy,
            )),
            scheduling: Arc::new(SchedulingHandler::new(
                call_id.as_str(),
                deps.store.clone(),
                deps.directory,
                deps.classifier,
                deps.collaborator_timeout,
            )),
        };

        Self {
            call_id,
            store: deps.store,
            notifier: deps.notifier,
            workflows,
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            tts_warmed: AtomicBool::new(false),
            confirmation_dispatched: AtomicBool::new(false),
            repetition: Mutex::new(Repetition::default()),
            tts_settle: deps.tts_settle,
            dispatch_backoff: deps.dispatch_backoff,
        }
    }

    /// Whether the agent is currently speaking (exposed for tests)
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// One-shot initialization on the first start signal: greeting plus the
    /// insurance prompt as discrete segments, then a pre-emptive transition
    /// straight to INSURANCE
    async fn handle_stream_start(&self) -> Vec<Frame> {
        // Forward the start signal first so the TTS adapter is initialized
        // before the first utterance reaches it
        let mut out = vec![Frame::StreamStart];

        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(call_id = %self.call_id, "Duplicate start signal ignored");
            return out;
        }

        tracing::info!(call_id = %self.call_id, "Controller initialized; sending greeting");
        for (i, text) in [GREETING_PART_ONE, GREETING_PART_TWO, prompts::INSURANCE_PROMPT]
            .into_iter()
            .enumerate()
        {
            out.push(Frame::Utterance {
                text: text.to_string(),
                segment: i,
            });
        }

        self.store
            .transition_phase(&self.call_id, IntakePhase::Insurance)
            .await;
        self.tts_warmed.store(true, Ordering::SeqCst);
        {
            let mut rep = self.repetition.lock();
            rep.last_response = Some(prompts::INSURANCE_PROMPT.to_string());
            rep.count = 1;
        }
        out
    }

    /// Route one finalized transcript to the active workflow
    async fn route(&self, input: &str, session: &CallSession) -> Option<String> {
        match session.phase {
            // Bypassed phases: jump forward rather than engage them. The
            // greeting already asked for insurance, so no extra prompt.
            IntakePhase::Greeting => {
                self.store
                    .transition_phase(&self.call_id, IntakePhase::Insurance)
                    .await;
                None
            }
            IntakePhase::EmergencyCheck => {
                self.store
                    .transition_phase(&self.call_id, IntakePhase::Insurance)
                    .await;
                Some(prompts::INSURANCE_PROMPT.to_string())
            }
            IntakePhase::Confirmation => Some(COMPLETION_RESPONSE.to_string()),
            IntakePhase::Completed => None,
            phase => {
                let Some(handler) = self.workflows.for_phase(phase) else {
                    return Some(prompts::NOT_UNDERSTOOD.to_string());
                };
                tracing::info!(
                    call_id = %self.call_id,
                    phase = %phase,
                    handler = handler.name(),
                    "Routing transcript to handler"
                );
                match handler.process_input(input, session).await {
                    Ok(response) => response,
                    Err(err) => {
                        // A broken handler never takes the call down; the
                        // caller just gets no response this turn
                        metrics::counter!("intake_handler_errors_total", "handler" => handler.name())
                            .increment(1);
                        tracing::error!(
                            call_id = %self.call_id,
                            phase = %phase,
                            handler = handler.name(),
                            error = %err,
                            "Handler failed; swallowing for this turn"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Repetition escalation: the same literal response is never spoken a
    /// second consecutive time; it is replaced with phase-appropriate
    /// clarification wording instead.
    fn check_repetition(&self, response: String) -> String {
        let mut rep = self.repetition.lock();
        if rep.last_response.as_deref() == Some(response.as_str()) {
            rep.count += 1;
            if rep.count >= MAX_SAME_RESPONSE {
                let escalated = Self::escalation_for(&response);
                tracing::info!(call_id = %self.call_id, "Escalating repeated prompt");
                rep.count = 0;
                rep.last_response = Some(escalated.clone());
                return escalated;
            }
            response
        } else {
            rep.count = 1;
            rep.last_response = Some(response.clone());
            response
        }
    }

    fn escalation_for(repeated: &str) -> String {
        if repeated.to_lowercase().contains("insurance provider name") {
            prompts::INSURANCE_ESCALATION.to_string()
        } else {
            prompts::GENERIC_ESCALATION.to_string()
        }
    }

    /// Build outbound frames for one response, warming the TTS engine once
    /// before the very first segment of the call
    async fn emit_segments(&self, response: &str) -> Vec<Frame> {
        let mut out = Vec::new();
        if !self.tts_warmed.swap(true, Ordering::SeqCst) {
            tracing::debug!(call_id = %self.call_id, "Warming TTS before first utterance");
            out.push(Frame::StreamStart);
            tokio::time::sleep(self.tts_settle).await;
        }
        for (i, sentence) in split_sentences(response).into_iter().enumerate() {
            out.push(Frame::Utterance {
                text: sentence,
                segment: i,
            });
        }
        out
    }

    /// Completion handoff: once the session reaches CONFIRMATION, dispatch
    /// the confirmation in a supervised background task (bounded retry with
    /// exponential backoff) and advance to COMPLETED.
    async fn maybe_complete(&self) {
        let Some(session) = self.store.get(&self.call_id).await else {
            return;
        };
        if session.phase != IntakePhase::Confirmation {
            return;
        }
        if self.confirmation_dispatched.swap(true, Ordering::SeqCst) {
            return;
        }

        let notifier = self.notifier.clone();
        let backoff = self.dispatch_backoff;
        let call_id = self.call_id.clone();
        self.tasks.spawn(async move {
            for attempt in 0..DISPATCH_ATTEMPTS {
                match notifier.send_confirmation(&session).await {
                    Ok(true) => {
                        metrics::counter!("intake_confirmations_total", "outcome" => "sent")
                            .increment(1);
                        tracing::info!(call_id = %call_id, "Confirmation dispatched");
                        return;
                    }
                    Ok(false) => {
                        tracing::warn!(call_id = %call_id, attempt, "Confirmation rejected");
                    }
                    Err(err) => {
                        tracing::warn!(call_id = %call_id, attempt, error = %err, "Confirmation dispatch failed");
                    }
                }
                tokio::time::sleep(backoff * 2u32.saturating_pow(attempt)).await;
            }
            metrics::counter!("intake_confirmations_total", "outcome" => "abandoned").increment(1);
            tracing::error!(call_id = %call_id, "Giving up on confirmation dispatch");
        });

        self.store
            .transition_phase(&self.call_id, IntakePhase::Completed)
            .await;
    }

    async fn handle_user_input(&self, text: &str) -> Result<Vec<Frame>> {
        let Some(session) = self.store.get(&self.call_id).await else {
            tracing::error!(call_id = %self.call_id, "No session found for transcript");
            return Ok(vec![]);
        };

        self.store
            .append_transcript(&self.call_id, Speaker::User, text)
            .await;

        let Some(response) = self.route(text, &session).await else {
            self.maybe_complete().await;
            return Ok(vec![]);
        };
        let response = self.check_repetition(response);

        self.store
            .append_transcript(&self.call_id, Speaker::Assistant, &response)
            .await;
        tracing::info!(call_id = %self.call_id, response = %response, "Agent responding");

        let frames = self.emit_segments(&response).await;
        self.maybe_complete().await;
        Ok(frames)
    }
}

#[async_trait]
impl FrameProcessor for IntakeController {
    async fn process(&self, frame: Frame, context: &mut ProcessorContext) -> Result<Vec<Frame>> {
        match frame {
            Frame::StreamStart => Ok(self.handle_stream_start().await),

            // Speech signals are generated downstream by the TTS adapter and
            // fed back here by the harness; they are consumed, never
            // re-emitted, or they would echo around the feedback loop
            Frame::SpeechStarted => {
                self.speaking.store(true, Ordering::SeqCst);
                Ok(vec![])
            }

            Frame::SpeechStopped => {
                self.speaking.store(false, Ordering::SeqCst);
                // After the closing line is spoken, end the call
                if let Some(session) = self.store.get(&self.call_id).await {
                    if session.phase == IntakePhase::Completed {
                        tracing::info!(call_id = %self.call_id, "Intake complete; ending call");
                        return Ok(vec![Frame::StreamEnd]);
                    }
                }
                Ok(vec![])
            }

            Frame::FinalTranscript { text, source, .. } => {
                if self.speaking.load(Ordering::SeqCst) {
                    // Talk-over capture: the caller's line is the agent's own
                    // echo or overlap, never real input
                    tracing::info!(
                        call_id = %self.call_id,
                        text = %text,
                        "Discarding transcript received while agent is speaking"
                    );
                    return Ok(vec![]);
                }
                if text.trim().is_empty() {
                    return Ok(vec![]);
                }
                context.next_turn();
                tracing::info!(
                    call_id = %self.call_id,
                    source = source.as_str(),
                    turn = context.turn_number,
                    text = %text,
                    "Processing finalized transcript"
                );
                self.handle_user_input(&text).await
            }

            Frame::InterimTranscript { text, source, .. } => {
                // Observability only; interim results are never dispatched
                tracing::debug!(
                    call_id = %self.call_id,
                    source = source.as_str(),
                    text = %text,
                    "Interim transcript"
                );
                Ok(vec![])
            }

            // Raw audio is consumed upstream by the STT adapter; anything
            // arriving here has no business continuing toward TTS
            Frame::AudioChunk(_) => Ok(vec![]),

            Frame::Error {
                stage,
                message,
                recoverable,
            } => {
                tracing::error!(
                    call_id = %self.call_id,
                    stage = %stage,
                    recoverable,
                    "Pipeline stage error: {message}"
                );
                Ok(vec![])
            }

            // Pass everything else through unchanged
            other => Ok(vec![other]),
        }
    }

    fn name(&self) -> &'static str {
        "intake_controller"
    }

    async fn on_stop(&self, _context: &mut ProcessorContext) -> Result<()> {
        // Bounded teardown of background work before call resources go away
        self.tasks.shutdown(Duration::from_secs(1)).await;
        Ok(())
    }
}
