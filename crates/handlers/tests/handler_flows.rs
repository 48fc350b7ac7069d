//! End-to-end handler flows against the in-memory state store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use intake_agent_core::{
    Address, AddressValidator, AppointmentSlot, CallSession, Error, IntakePhase, Provider,
    ProviderDirectory, Result, MEMBER_ID_PLACEHOLDER,
};
use intake_agent_handlers::{
    DemographicsHandler, InsuranceHandler, PhaseHandler, SchedulingHandler, SymptomHandler,
};
use intake_agent_handlers::demographics::ContactPolicy;
use intake_agent_state::{InMemoryStateStore, StateStore};

const CALL_ID: &str = "CA-test-1";
const TIMEOUT: Duration = Duration::from_secs(5);

struct UnavailableValidator;

#[async_trait]
impl AddressValidator for UnavailableValidator {
    async fn validate(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Address> {
        Err(Error::Unavailable("validator down".into()))
    }
}

struct ApprovingValidator;

#[async_trait]
impl AddressValidator for ApprovingValidator {
    async fn validate(&self, street: &str, city: &str, state: &str, zip: &str) -> Result<Address> {
        Ok(Address {
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            zip_code: zip.to_string(),
            validated: true,
            validation_message: Some("verified".into()),
        })
    }
}

struct FixedDirectory {
    slots: Vec<AppointmentSlot>,
}

impl FixedDirectory {
    fn with_tomorrow_slots() -> (Self, DateTime<Utc>) {
        let now = Utc::now();
        let tomorrow = (now + ChronoDuration::days(1)).date_naive();
        let morning = DateTime::<Utc>::from_naive_utc_and_offset(
            tomorrow.and_hms_opt(10, 0, 0).unwrap(),
            Utc,
        );
        let afternoon = DateTime::<Utc>::from_naive_utc_and_offset(
            tomorrow.and_hms_opt(14, 0, 0).unwrap(),
            Utc,
        );
        let slots = vec![
            AppointmentSlot {
                starts_at: morning,
                display: "tomorrow at 10:00 AM".into(),
                keywords: vec!["tomorrow".into(), "morning".into()],
            },
            AppointmentSlot {
                starts_at: afternoon,
                display: "tomorrow at 2:00 PM".into(),
                keywords: vec!["tomorrow".into(), "afternoon".into()],
            },
        ];
        (Self { slots }, afternoon)
    }
}

#[async_trait]
impl ProviderDirectory for FixedDirectory {
    async fn list_providers(&self, _: Option<&str>, _: Option<&str>) -> Result<Vec<Provider>> {
        Ok(vec![
            Provider {
                id: "p1".into(),
                name: "Sarah Smith".into(),
                specialty: "Family Medicine".into(),
                accepted_payers: vec![],
                rating: 4.8,
            },
            Provider {
                id: "p2".into(),
                name: "Michael Johnson".into(),
                specialty: "Internal Medicine".into(),
                accepted_payers: vec![],
                rating: 4.6,
            },
            Provider {
                id: "p3".into(),
                name: "Priya Patel".into(),
                specialty: "Family Medicine".into(),
                accepted_payers: vec![],
                rating: 4.9,
            },
        ])
    }

    async fn list_slots(&self, _: &str) -> Result<Vec<AppointmentSlot>> {
        Ok(self.slots.clone())
    }
}

async fn session(store: &Arc<InMemoryStateStore>) -> CallSession {
    store.get(CALL_ID).await.expect("session exists")
}

#[tokio::test]
async fn insurance_single_utterance_fast_path() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Insurance)
        .await;

    let handler = InsuranceHandler::new(CALL_ID, store.clone() as Arc<dyn StateStore>);
    let response = handler
        .process_input(
            "I have Blue Cross and my member id is ABC123456",
            &session(&store).await,
        )
        .await
        .unwrap()
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ChiefComplaint);
    let insurance = state.patient_info.insurance.unwrap();
    assert!(insurance.payer_name.contains("Blue Cross"));
    assert!(insurance.member_id.contains("ABC123456"));
    assert!(response.contains("ABC123456"));
}

#[tokio::test]
async fn insurance_step_by_step_with_retries() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Insurance)
        .await;

    let handler = InsuranceHandler::new(CALL_ID, store.clone() as Arc<dyn StateStore>);

    // Non-answer twice, then anything is accepted as the payer
    for _ in 0..2 {
        let response = handler
            .process_input("um", &session(&store).await)
            .await
            .unwrap()
            .unwrap();
        assert!(response.contains("insurance provider name"));
    }
    let response = handler
        .process_input("um", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("member ID"));

    // Member ID captured and the phase advances
    handler
        .process_input("it is XK99812", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ChiefComplaint);
    let insurance = state.patient_info.insurance.unwrap();
    assert!(insurance.is_complete());
    assert_ne!(insurance.member_id, MEMBER_ID_PLACEHOLDER);
    assert!(state.error_count >= 2);
}

#[tokio::test]
async fn symptom_flow_collects_duration_and_pain_scale() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::ChiefComplaint)
        .await;

    let handler = SymptomHandler::new(CALL_ID, store.clone() as Arc<dyn StateStore>);

    let response = handler
        .process_input("I have a bad cough", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("How long"));

    handler
        .process_input("about two weeks, maybe a 6", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::Demographics);
    let complaint = state.patient_info.chief_complaint.unwrap();
    assert!(complaint.contains("bad cough"));
    assert!(complaint.contains("Duration"));
    assert_eq!(state.patient_info.urgency_level, Some(6));
}

#[tokio::test]
async fn symptom_emergency_keywords_advise_but_do_not_halt() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::ChiefComplaint)
        .await;

    let handler = SymptomHandler::new(CALL_ID, store.clone() as Arc<dyn StateStore>);

    let response = handler
        .process_input("I'm having chest pain", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("911"));
    // Flow continues: same phase, complaint stored
    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ChiefComplaint);
    assert!(state.patient_info.chief_complaint.is_some());

    handler
        .process_input("since yesterday", &session(&store).await)
        .await
        .unwrap();
    assert_eq!(session(&store).await.phase, IntakePhase::Demographics);
}

#[tokio::test]
async fn address_accepted_unvalidated_when_validator_unavailable() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Demographics)
        .await;

    let handler = DemographicsHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(UnavailableValidator),
        TIMEOUT,
        ContactPolicy {
            collect_email: false,
            test_email: "intake-test@example.com".into(),
        },
    );

    handler
        .process_input(
            "742 Evergreen Terrace Springfield IL 62704",
            &session(&store).await,
        )
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ContactInfo);
    let address = state.patient_info.address.unwrap();
    assert!(!address.validated);
    assert!(address.street.contains("742 Evergreen Terrace"));
}

#[tokio::test]
async fn single_word_reply_is_not_an_address() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Demographics)
        .await;

    let handler = DemographicsHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(UnavailableValidator),
        TIMEOUT,
        ContactPolicy {
            collect_email: false,
            test_email: "intake-test@example.com".into(),
        },
    );

    let response = handler
        .process_input("yes", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("street address"));

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::Demographics);
    assert!(state.patient_info.address.is_none());
}

#[tokio::test]
async fn phone_then_email_skip_advances_to_provider_selection() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Demographics)
        .await;

    let handler = DemographicsHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(ApprovingValidator),
        TIMEOUT,
        ContactPolicy {
            collect_email: false,
            test_email: "intake-test@example.com".into(),
        },
    );

    handler
        .process_input(
            "150 Van Ness Ave, San Francisco, CA 94102",
            &session(&store).await,
        )
        .await
        .unwrap();
    assert_eq!(session(&store).await.phase, IntakePhase::ContactInfo);

    // Too few digits first
    let response = handler
        .process_input("call me anytime", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("phone number"));

    handler
        .process_input("555 123 4567", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ProviderSelection);
    assert_eq!(
        state.patient_info.phone_number.as_deref(),
        Some("(555) 123-4567")
    );
    assert_eq!(
        state.patient_info.email.as_deref(),
        Some("intake-test@example.com")
    );
}

#[tokio::test]
async fn email_collected_when_policy_requires_it() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::Demographics)
        .await;

    let handler = DemographicsHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(ApprovingValidator),
        TIMEOUT,
        ContactPolicy {
            collect_email: true,
            test_email: "intake-test@example.com".into(),
        },
    );

    handler
        .process_input(
            "150 Van Ness Ave, San Francisco, CA 94102",
            &session(&store).await,
        )
        .await
        .unwrap();
    let response = handler
        .process_input("5551234567", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("email"));
    assert_eq!(session(&store).await.phase, IntakePhase::ContactInfo);

    handler
        .process_input("it's Jane.Doe@example.com", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::ProviderSelection);
    assert_eq!(
        state.patient_info.email.as_deref(),
        Some("jane.doe@example.com")
    );
}

#[tokio::test]
async fn provider_choice_three_selects_third_candidate() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::ProviderSelection)
        .await;

    let (directory, _) = FixedDirectory::with_tomorrow_slots();
    let handler = SchedulingHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(directory),
        None,
        TIMEOUT,
    );

    // First turn presents the menu
    let response = handler
        .process_input("okay", &session(&store).await)
        .await
        .unwrap()
        .unwrap();
    assert!(response.contains("1. Dr. Sarah Smith"));
    assert!(response.contains("3. Dr. Priya Patel"));
    assert_eq!(session(&store).await.phase, IntakePhase::ProviderSelection);

    // "3" picks the third candidate (1-based)
    handler
        .process_input("3", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::AppointmentScheduling);
    assert_eq!(
        state.patient_info.selected_provider.as_deref(),
        Some("Dr. Priya Patel")
    );
}

#[tokio::test]
async fn tomorrow_at_two_resolves_to_afternoon_slot() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::ProviderSelection)
        .await;

    let (directory, afternoon) = FixedDirectory::with_tomorrow_slots();
    let handler = SchedulingHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(directory),
        None,
        TIMEOUT,
    );

    handler
        .process_input("hi", &session(&store).await)
        .await
        .unwrap();
    handler
        .process_input("1", &session(&store).await)
        .await
        .unwrap();
    assert_eq!(
        session(&store).await.phase,
        IntakePhase::AppointmentScheduling
    );

    let response = handler
        .process_input("tomorrow at 2", &session(&store).await)
        .await
        .unwrap()
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::Confirmation);
    assert_eq!(state.patient_info.appointment_datetime, Some(afternoon));
    assert!(response.contains("2:00 PM"));
}

#[tokio::test]
async fn unresolvable_slot_choice_defaults_to_first() {
    let store = Arc::new(InMemoryStateStore::new());
    store.create(CALL_ID).await.unwrap();
    store
        .transition_phase(CALL_ID, IntakePhase::ProviderSelection)
        .await;

    let (directory, _) = FixedDirectory::with_tomorrow_slots();
    let handler = SchedulingHandler::new(
        CALL_ID,
        store.clone() as Arc<dyn StateStore>,
        Arc::new(directory),
        None,
        TIMEOUT,
    );

    handler
        .process_input("hi", &session(&store).await)
        .await
        .unwrap();
    handler
        .process_input("Priya Patel please", &session(&store).await)
        .await
        .unwrap();

    handler
        .process_input("whichever", &session(&store).await)
        .await
        .unwrap();

    let state = session(&store).await;
    assert_eq!(state.phase, IntakePhase::Confirmation);
    assert!(state.patient_info.appointment_datetime.is_some());
}
