//! Controller behavior: greeting idempotency, speaking-state gating,
//! repetition escalation, and the full intake happy path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use intake_agent_agent::{ControllerDeps, IntakeController};
use intake_agent_core::{
    Address, AddressValidator, AppointmentSlot, CallSession, ConfirmationSender, Error, Frame,
    FrameProcessor, IntakePhase, ProcessorContext, Provider, ProviderDirectory, Result,
    TranscriptSource,
};
use intake_agent_handlers::ContactPolicy;
use intake_agent_state::{InMemoryStateStore, StateStore};

const CALL_ID: &str = "CA-ctl-1";

struct DownValidator;

#[async_trait]
impl AddressValidator for DownValidator {
    async fn validate(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Address> {
        Err(Error::Unavailable("down".into()))
    }
}

struct OneDoctorDirectory {
    afternoon: DateTime<Utc>,
}

impl OneDoctorDirectory {
    fn new() -> Self {
        let tomorrow = (Utc::now() + ChronoDuration::days(1)).date_naive();
        let afternoon = DateTime::<Utc>::from_naive_utc_and_offset(
            tomorrow.and_hms_opt(14, 0, 0).unwrap(),
            Utc,
        );
        Self { afternoon }
    }
}

#[async_trait]
impl ProviderDirectory for OneDoctorDirectory {
    async fn list_providers(&self, _: Option<&str>, _: Option<&str>) -> Result<Vec<Provider>> {
        Ok(vec![Provider {
            id: "p1".into(),
            name: "Sarah Smith".into(),
            specialty: "Family Medicine".into(),
            accepted_payers: vec![],
            rating: 4.8,
        }])
    }

    async fn list_slots(&self, _: &str) -> Result<Vec<AppointmentSlot>> {
        Ok(vec![AppointmentSlot {
            starts_at: self.afternoon,
            display: "tomorrow at 2:00 PM".into(),
            keywords: vec!["tomorrow".into(), "afternoon".into()],
        }])
    }
}

#[derive(Default)]
struct CountingNotifier {
    sent: AtomicU32,
}

#[async_trait]
impl ConfirmationSender for CountingNotifier {
    async fn send_confirmation(&self, _: &CallSession) -> Result<bool> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

struct Fixture {
    controller: IntakeController,
    store: Arc<InMemoryStateStore>,
    notifier: Arc<CountingNotifier>,
    ctx: ProcessorContext,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    let notifier = Arc::new(CountingNotifier::default());

    let controller = IntakeController::new(
        CALL_ID,
        ControllerDeps {
            store: store.clone() as Arc<dyn StateStore>,
            validator: Arc::new(DownValidator),
            directory: Arc::new(OneDoctorDirectory::new()),
            classifier: None,
            notifier: notifier.clone(),
            contact_policy: ContactPolicy {
                collect_email: false,
                test_email: "intake-test@example.com".into(),
            },
            collaborator_timeout: Duration::from_secs(5),
            tts_settle: Duration::from_millis(1),
            dispatch_backoff: Duration::from_millis(1),
        },
    );

    Fixture {
        controller,
        store,
        notifier,
        ctx: ProcessorContext::new(CALL_ID),
    }
}

fn final_transcript(text: &str) -> Frame {
    Frame::FinalTranscript {
        text: text.to_string(),
        confidence: Some(0.95),
        source: TranscriptSource::Pipeline,
    }
}

fn spoken_text(frames: &[Frame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Utterance { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn greeting_is_idempotent_and_preempts_to_insurance() {
    let mut fx = fixture().await;

    let first = fx
        .controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();
    let greeting = spoken_text(&first);
    assert!(greeting.contains("Hello"));
    assert!(greeting.contains("insurance provider name"));
    assert!(matches!(first[0], Frame::StreamStart));

    let session = fx.store.get(CALL_ID).await.unwrap();
    assert_eq!(session.phase, IntakePhase::Insurance);

    // Second start signal: forwarded, but no second greeting
    let second = fx
        .controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert!(matches!(second[0], Frame::StreamStart));
}

#[tokio::test]
async fn transcript_while_speaking_is_discarded() {
    let mut fx = fixture().await;
    fx.controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();

    fx.controller
        .process(Frame::SpeechStarted, &mut fx.ctx)
        .await
        .unwrap();
    assert!(fx.controller.is_speaking());

    let frames = fx
        .controller
        .process(final_transcript("I have Aetna"), &mut fx.ctx)
        .await
        .unwrap();
    assert!(frames.is_empty());

    // No handler ran: no user transcript entry, phase unchanged
    let session = fx.store.get(CALL_ID).await.unwrap();
    assert_eq!(session.phase, IntakePhase::Insurance);
    assert!(session.transcript.is_empty());

    fx.controller
        .process(Frame::SpeechStopped, &mut fx.ctx)
        .await
        .unwrap();
    assert!(!fx.controller.is_speaking());
}

#[tokio::test]
async fn interim_transcripts_are_never_dispatched() {
    let mut fx = fixture().await;
    fx.controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();

    let frames = fx
        .controller
        .process(
            Frame::InterimTranscript {
                text: "I have Blue".into(),
                confidence: Some(0.4),
                source: TranscriptSource::Direct,
            },
            &mut fx.ctx,
        )
        .await
        .unwrap();
    assert!(frames.is_empty());
    assert!(fx.store.get(CALL_ID).await.unwrap().transcript.is_empty());
}

#[tokio::test]
async fn repeated_prompt_is_escalated_not_replayed() {
    let mut fx = fixture().await;
    fx.controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();

    let first = spoken_text(
        &fx.controller
            .process(final_transcript("um"), &mut fx.ctx)
            .await
            .unwrap(),
    );
    let second = spoken_text(
        &fx.controller
            .process(final_transcript("um"), &mut fx.ctx)
            .await
            .unwrap(),
    );

    assert!(first.contains("insurance provider name"));
    assert_ne!(first, second, "identical prompt must not repeat");
    assert!(second.contains("Let me explain"));
}

#[tokio::test]
async fn full_intake_reaches_completed_and_hangs_up() {
    let mut fx = fixture().await;
    fx.controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();

    let turns = [
        "I have Blue Cross and my member id is ABC123456",
        "I have a persistent cough",
        "about two weeks, maybe a 4",
        "742 Evergreen Terrace Springfield IL 62704",
    ];

    for turn in &turns {
        fx.controller
            .process(final_transcript(turn), &mut fx.ctx)
            .await
            .unwrap();
    }
    assert_eq!(
        fx.store.get(CALL_ID).await.unwrap().phase,
        IntakePhase::ContactInfo
    );

    // Phone digits
    fx.controller
        .process(final_transcript("5551234567"), &mut fx.ctx)
        .await
        .unwrap();
    assert_eq!(
        fx.store.get(CALL_ID).await.unwrap().phase,
        IntakePhase::ProviderSelection
    );

    // Menu turn, then selection, then slot choice
    fx.controller
        .process(final_transcript("okay"), &mut fx.ctx)
        .await
        .unwrap();
    fx.controller
        .process(final_transcript("1"), &mut fx.ctx)
        .await
        .unwrap();
    let goodbye = spoken_text(
        &fx.controller
            .process(final_transcript("tomorrow at 2"), &mut fx.ctx)
            .await
            .unwrap(),
    );
    assert!(goodbye.contains("Goodbye"));

    // Completion handoff ran: phase COMPLETED, confirmation dispatched
    let session = fx.store.get(CALL_ID).await.unwrap();
    assert_eq!(session.phase, IntakePhase::Completed);
    assert!(session.patient_info.insurance_complete());
    assert!(session.patient_info.appointment_datetime.is_some());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.notifier.sent.load(Ordering::SeqCst), 1);

    // Once the goodbye finishes speaking, the transport is told to close
    fx.controller
        .process(Frame::SpeechStarted, &mut fx.ctx)
        .await
        .unwrap();
    let frames = fx
        .controller
        .process(Frame::SpeechStopped, &mut fx.ctx)
        .await
        .unwrap();
    assert!(frames.iter().any(|f| matches!(f, Frame::StreamEnd)));
}

#[tokio::test]
async fn phase_only_moves_forward_through_the_whole_call() {
    let mut fx = fixture().await;
    fx.controller
        .process(Frame::StreamStart, &mut fx.ctx)
        .await
        .unwrap();

    let inputs = [
        "I have Kaiser",
        "member id KP123456",
        "migraines",
        "three days, it's an 8",
        "150 Van Ness Ave San Francisco CA 94102",
        "5551234567",
        "sure",
        "1",
        "tomorrow at 2",
        "anything else?",
    ];

    let mut last_ordinal = 0u8;
    for input in inputs {
        fx.controller
            .process(final_transcript(input), &mut fx.ctx)
            .await
            .unwrap();
        let phase = fx.store.get(CALL_ID).await.unwrap().phase;
        assert!(
            phase.ordinal() >= last_ordinal,
            "phase regressed to {phase} after '{input}'"
        );
        last_ordinal = phase.ordinal();
    }
    assert_eq!(
        fx.store.get(CALL_ID).await.unwrap().phase,
        IntakePhase::Completed
    );
}
