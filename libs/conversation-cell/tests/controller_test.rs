use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use conversation_cell::services::controller::{
    ANSWER_FAILED, APPOINTMENT_FAILED, DOCTORS_FAILED, INVALID_APPOINTMENT_ID, INVALID_BOOKING_ID,
    MISSING_CONTACT_DETAILS, RESCHEDULE_FAILED, START_DIAGNOSTIC_FAILED, TESTS_FAILED,
    TEST_BOOKING_FAILED, WELCOME_MESSAGE,
};
use conversation_cell::*;
use session_cell::{HistoryEntryKind, SessionStore};
use shared_database::MemoryStore;
use shared_utils::test_utils::{MockHospitalResponses, TestConfig};

const SYMPTOMS: &str = "I have a headache and fever";

async fn setup() -> (MockServer, ConversationController, Arc<SessionStore>) {
    let server = MockServer::start().await;
    let config = TestConfig::for_mock_server(&server.uri()).to_app_config();
    let store = Arc::new(SessionStore::new(Arc::new(MemoryStore::new())));
    let controller = ConversationController::new(&config, store.clone());
    (server, controller, store)
}

async fn mount_start(server: &MockServer, question_id: Option<&str>) {
    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::start_diagnostic_response("diag-1", question_id)),
        )
        .mount(server)
        .await;
}

async fn start_diagnosing(server: &MockServer, controller: &ConversationController) {
    mount_start(server, Some("q1")).await;
    controller.send_message(SYMPTOMS).await.unwrap();
}

fn doctor() -> Doctor {
    serde_json::from_value(MockHospitalResponses::doctors_response()[0].clone()).unwrap()
}

fn appointment(id: i64) -> AppointmentRecord {
    AppointmentRecord {
        id,
        doctor_name: "Dr. Aoife Byrne".to_string(),
        patient_name: Some("Sam Byrne".to_string()),
        appointment_date: Some("2026-11-02".to_string()),
        appointment_time: Some("09:00".to_string()),
        status: "confirmed".to_string(),
        message: "Appointment booked successfully".to_string(),
    }
}

fn appointment_submission(name: &str) -> AppointmentSubmission {
    AppointmentSubmission {
        patient_name: name.to_string(),
        patient_phone: "+353 87 123 4567".to_string(),
        patient_email: None,
        appointment_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        symptoms: None,
    }
}

fn test_booking_submission() -> TestBookingSubmission {
    TestBookingSubmission {
        patient_name: "Sam Byrne".to_string(),
        patient_phone: "+353 87 123 4567".to_string(),
        preferred_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        preferred_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
    }
}

fn recommended_tests() -> Vec<TestRecommendation> {
    serde_json::from_value(MockHospitalResponses::tests_response()["recommendations"].clone()).unwrap()
}

fn restore(server: &MockServer, store: &Arc<SessionStore>) -> ConversationController {
    let config = TestConfig::for_mock_server(&server.uri()).to_app_config();
    ConversationController::new(&config, store.clone())
}

#[tokio::test]
async fn test_new_controller_greets_once() {
    let (_server, controller, store) = setup().await;

    let messages = controller.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, WELCOME_MESSAGE);
    assert_eq!(store.get_conversation_history().len(), 1);
}

#[tokio::test]
async fn test_symptoms_start_diagnostic_session() {
    let (server, controller, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .and(query_param("symptoms", SYMPTOMS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::start_diagnostic_response("diag-1", Some("q1"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.send_message(SYMPTOMS).await.unwrap();

    assert_eq!(appended.len(), 3);
    assert_eq!(appended[0].role, Role::User);
    assert_eq!(appended[2].message_type, MessageType::DiagnosticQuestion);
    assert_eq!(appended[2].content, "How long have you had these symptoms?");

    let state = controller.diagnostic_state().await;
    assert!(state.is_diagnosing());
    assert_eq!(state.session_id(), Some("diag-1"));
    assert_eq!(state.current_question_id(), Some("q1"));

    assert_eq!(store.get_conversation_history().len(), 4);
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn test_small_talk_makes_no_api_call() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let appended = controller.send_message("hi").await.unwrap();

    assert_eq!(appended.len(), 2);
    assert_eq!(appended[1].content, ONBOARDING_PROMPT);
    assert_eq!(controller.diagnostic_state().await, DiagnosticState::Idle);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let (_server, controller, _store) = setup().await;

    assert_matches!(controller.send_message("   ").await, Err(ConversationError::EmptyMessage));
    assert_eq!(controller.messages().await.len(), 1);
}

#[tokio::test]
async fn test_start_failure_apologises_and_stays_idle() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .respond_with(ResponseTemplate::new(500).set_body_json(MockHospitalResponses::error_detail("boom")))
        .mount(&server)
        .await;

    let appended = assert_ok!(controller.send_message(SYMPTOMS).await);

    assert_eq!(appended.last().unwrap().content, START_DIAGNOSTIC_FAILED);
    assert_eq!(controller.diagnostic_state().await, DiagnosticState::Idle);
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn test_answer_moves_to_next_question() {
    let (server, controller, _store) = setup().await;
    start_diagnosing(&server, &controller).await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .and(query_param("session_id", "diag-1"))
        .and(query_param("question_id", "q1"))
        .and(query_param("answer_value", "1-3 days"))
        .and(query_param("question_type", "single_choice"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::next_question_response("continue_diagnostic", "q2")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.send_message("1-3 days").await.unwrap();

    assert_eq!(appended.last().unwrap().message_type, MessageType::DiagnosticQuestion);
    let state = controller.diagnostic_state().await;
    assert_eq!(state.current_question_id(), Some("q2"));
    assert_eq!(state.symptoms(), Some(SYMPTOMS));
}

#[tokio::test]
async fn test_diagnosis_appends_single_result_and_records_history() {
    let (server, controller, store) = setup().await;
    start_diagnosing(&server, &controller).await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(MockHospitalResponses::diagnosis_response("provide_diagnosis")),
        )
        .mount(&server)
        .await;

    let appended = controller.send_message("More than 3 days").await.unwrap();

    assert_eq!(appended.len(), 2);
    let results: Vec<Message> = controller
        .messages()
        .await
        .into_iter()
        .filter(|m| m.message_type == MessageType::DiagnosticResult)
        .collect();
    assert_eq!(results.len(), 1);
    assert_matches!(
        &results[0].payload,
        Some(MessagePayload::Diagnosis(result)) if result.condition.as_deref() == Some("Tension headache")
    );

    let state = controller.diagnostic_state().await;
    assert!(!state.is_diagnosing());
    assert_eq!(state.current_question_id(), None);

    let history = store.get_patient_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, HistoryEntryKind::Diagnosis);
    assert_eq!(history[0].diagnosis.as_deref(), Some("Tension headache"));
    assert_eq!(history[0].severity.as_deref(), Some("mild"));
}

#[tokio::test]
async fn test_unknown_next_step_changes_nothing() {
    let (server, controller, _store) = setup().await;
    start_diagnosing(&server, &controller).await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"next_step": "ask_followup"})))
        .mount(&server)
        .await;

    let appended = controller.send_message("yes").await.unwrap();

    assert_eq!(appended.len(), 1);
    assert_eq!(controller.diagnostic_state().await.current_question_id(), Some("q1"));
}

#[tokio::test]
async fn test_book_tests_phrase_lists_recommendations() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/tests/recommendations/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::tests_response()))
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.send_message("Please book medical tests for my cough").await.unwrap();

    let reply = appended.last().unwrap();
    assert_eq!(reply.message_type, MessageType::Tests);
    assert_matches!(&reply.payload, Some(MessagePayload::Tests(tests)) if tests.len() == 2);
}

#[tokio::test]
async fn test_book_appointment_uses_diagnosed_symptoms() {
    let (server, controller, _store) = setup().await;
    start_diagnosing(&server, &controller).await;

    Mock::given(method("POST"))
        .and(path("/recommend-doctors"))
        .and(body_partial_json(json!({"symptoms": SYMPTOMS})))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::doctors_response()))
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.send_message("I'd like to book an appointment").await.unwrap();

    assert_matches!(
        &appended.last().unwrap().payload,
        Some(MessagePayload::Doctors(doctors)) if doctors[0].name == "Dr. Aoife Byrne"
    );
}

#[tokio::test]
async fn test_appointment_submission_replaces_form_with_confirmation() {
    let (server, controller, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-appointment"))
        .and(body_partial_json(json!({
            "doctor_id": 11,
            "patient_name": "Sam Byrne",
            "appointment_date": "2026-11-02",
            "appointment_time": "09:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::appointment_response(42)))
        .expect(1)
        .mount(&server)
        .await;

    let form = controller.select_doctor(doctor()).await;
    assert_eq!(form.message_type, MessageType::AppointmentForm);

    let appended = controller
        .submit_appointment(form.id(), appointment_submission("Sam Byrne"))
        .await
        .unwrap();

    let confirmation = &appended[0];
    assert_eq!(confirmation.message_type, MessageType::AppointmentSuccess);
    assert_eq!(confirmation.content, "✅ Appointment booked successfully");
    assert_matches!(&confirmation.payload, Some(MessagePayload::Appointment(record)) if record.id == 42);

    assert!(controller.messages().await.iter().all(|m| m.id() != form.id()));
    let history = store.get_patient_history();
    assert_eq!(history[0].kind, HistoryEntryKind::Appointment);
    assert_eq!(history[0].doctor_name.as_deref(), Some("Dr. Aoife Byrne"));
}

#[tokio::test]
async fn test_appointment_failure_keeps_form() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-appointment"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let form = controller.select_doctor(doctor()).await;
    let appended = controller
        .submit_appointment(form.id(), appointment_submission("Sam Byrne"))
        .await
        .unwrap();

    assert_eq!(appended[0].content, APPOINTMENT_FAILED);
    assert!(controller.messages().await.iter().any(|m| m.id() == form.id()));
}

#[tokio::test]
async fn test_appointment_requires_contact_details() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-appointment"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let form = controller.select_doctor(doctor()).await;
    let appended = controller
        .submit_appointment(form.id(), appointment_submission("  "))
        .await
        .unwrap();

    assert_eq!(appended[0].content, MISSING_CONTACT_DETAILS);
}

#[tokio::test]
async fn test_submitting_unknown_form_fails() {
    let (_server, controller, _store) = setup().await;

    let result = controller
        .submit_appointment("msg_missing", appointment_submission("Sam Byrne"))
        .await;

    assert_matches!(result, Err(ConversationError::FormNotFound(id)) if id == "msg_missing");
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn test_test_booking_confirms_selected_tests() {
    let (server, controller, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-tests"))
        .and(body_partial_json(json!({"test_ids": [7, 9], "preferred_time": "08:30"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::test_booking_response("TB-1")))
        .expect(1)
        .mount(&server)
        .await;

    let form = controller.select_tests(recommended_tests()).await;

    let appended = controller
        .submit_test_booking(form.id(), test_booking_submission())
        .await
        .unwrap();

    assert_eq!(appended[0].message_type, MessageType::TestSuccess);
    assert_matches!(&appended[0].payload, Some(MessagePayload::TestBooking(record)) if record.booking_id == "TB-1");
    assert_eq!(store.get_patient_history()[0].kind, HistoryEntryKind::TestBooking);
}

#[tokio::test]
async fn test_reschedule_with_invalid_id_makes_no_call() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/reschedule-appointment"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let form = controller.open_reschedule_form(appointment(5)).await;
    let appended = controller
        .submit_reschedule(
            form.id(),
            RescheduleSubmission {
                appointment_id: Some(0),
                new_date: NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
                new_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            },
        )
        .await
        .unwrap();

    assert_eq!(appended[0].content, INVALID_APPOINTMENT_ID);
}

#[tokio::test]
async fn test_reschedule_confirms_new_slot() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/reschedule-appointment"))
        .and(body_partial_json(json!({"appointment_id": 5, "new_date": "2026-11-09", "new_time": "10:30"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::reschedule_response(5, "2026-11-09", "10:30")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let form = controller.open_reschedule_form(appointment(5)).await;
    let appended = controller
        .submit_reschedule(
            form.id(),
            RescheduleSubmission {
                appointment_id: Some(5),
                new_date: NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
                new_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            },
        )
        .await
        .unwrap();

    assert_eq!(appended[0].content, "✅ Your appointment with Dr. Aoife Byrne is now on 2026-11-09 at 10:30.");
    assert!(controller.messages().await.iter().all(|m| m.id() != form.id()));
}

#[tokio::test]
async fn test_cancel_failure_shows_server_detail() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/h/st-marys/cancel-appointment/5"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(MockHospitalResponses::error_detail("Appointment not found")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.cancel_appointment(Some(5)).await.unwrap();

    assert_eq!(appended[0].content, "❌ Failed to cancel appointment: Appointment not found");
}

#[tokio::test]
async fn test_cancel_test_booking() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/tests/cancel/TB-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Test booking cancelled"})))
        .expect(1)
        .mount(&server)
        .await;

    let appended = controller.cancel_test_booking("TB-1").await.unwrap();

    assert_eq!(appended[0].content, "✅ Test booking cancelled");
}

#[tokio::test]
async fn test_concurrent_request_is_busy() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::start_diagnostic_response("diag-1", Some("q1")))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (first, second) = tokio::join!(controller.send_message(SYMPTOMS), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.send_message("my neck is stiff as well").await
    });

    assert_ok!(first);
    assert_matches!(assert_err!(second), ConversationError::Busy);
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn test_clear_chat_drops_in_flight_response() {
    let (server, controller, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/start-adaptive-diagnostic"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::start_diagnostic_response("diag-1", Some("q1")))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let old_session = store.get_session_id();
    let (outcome, new_session) = tokio::join!(controller.send_message(SYMPTOMS), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.clear_chat().await
    });

    assert_matches!(outcome, Err(ConversationError::Superseded));
    assert_ne!(old_session, new_session);
    assert_eq!(store.get_session_id(), new_session);

    let messages = controller.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, WELCOME_MESSAGE);
    assert_eq!(controller.diagnostic_state().await, DiagnosticState::Idle);
    assert!(!controller.is_loading().await);
}

#[tokio::test]
async fn test_transcript_is_restored_from_store() {
    let (server, controller, store) = setup().await;
    start_diagnosing(&server, &controller).await;
    let before = controller.messages().await;

    let restored = restore(&server, &store);

    assert_eq!(restored.messages().await, before);
    assert_eq!(store.get_conversation_history().len(), before.len());
}

#[tokio::test]
async fn test_recognized_patient_prefills_forms() {
    let (_server, controller, store) = setup().await;

    controller
        .recognize_patient(
            PatientProfile {
                name: Some("Sam Byrne".to_string()),
                phone: Some("+353 87 123 4567".to_string()),
                age: Some(42),
                recent_symptoms: Some("migraine".to_string()),
                ..Default::default()
            },
            None,
        )
        .await;

    assert!(controller.recognition().await.is_recognized());
    let info = store.get_user_info().unwrap();
    assert_eq!(info.first_name.as_deref(), Some("Sam"));
    assert_eq!(info.last_name.as_deref(), Some("Byrne"));

    let form = controller.select_doctor(doctor()).await;
    assert_matches!(
        &form.payload,
        Some(MessagePayload::AppointmentForm(form))
            if form.patient_name == "Sam Byrne" && form.symptoms == "migraine"
    );
}

#[tokio::test]
async fn test_submitted_form_stays_gone_after_restore() {
    let (server, controller, store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-appointment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::appointment_response(42)))
        .expect(1)
        .mount(&server)
        .await;

    let form = controller.select_doctor(doctor()).await;
    controller
        .submit_appointment(form.id(), appointment_submission("Sam Byrne"))
        .await
        .unwrap();

    let restored = restore(&server, &store);

    assert!(restored.messages().await.iter().all(|m| m.id() != form.id()));
    assert!(store.get_conversation_history().iter().all(|e| e.id != form.id()));
    assert_matches!(
        restored.submit_appointment(form.id(), appointment_submission("Sam Byrne")).await,
        Err(ConversationError::FormNotFound(_))
    );
}

#[tokio::test]
async fn test_open_form_survives_restore() {
    let (server, controller, store) = setup().await;

    let form = controller.select_tests(recommended_tests()).await;
    let restored = restore(&server, &store);

    assert!(restored.messages().await.iter().any(|m| m.id() == form.id()));
}

#[tokio::test]
async fn test_restore_resumes_pending_question() {
    let (server, controller, store) = setup().await;
    start_diagnosing(&server, &controller).await;

    let restored = restore(&server, &store);

    let state = restored.diagnostic_state().await;
    assert!(state.is_diagnosing());
    assert_eq!(state.session_id(), Some("diag-1"));
    assert_eq!(state.symptoms(), Some(SYMPTOMS));
    assert_eq!(state.current_question_id(), Some("q1"));

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .and(query_param("session_id", "diag-1"))
        .and(query_param("question_id", "q1"))
        .and(query_param("answer_value", "yes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockHospitalResponses::next_question_response("answer_question", "q2")),
        )
        .expect(1)
        .mount(&server)
        .await;

    restored.send_message("yes").await.unwrap();
    assert_eq!(restored.diagnostic_state().await.current_question_id(), Some("q2"));
}

#[tokio::test]
async fn test_restore_after_diagnosis_is_idle() {
    let (server, controller, store) = setup().await;
    start_diagnosing(&server, &controller).await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(MockHospitalResponses::diagnosis_response("provide_diagnosis")),
        )
        .mount(&server)
        .await;
    controller.send_message("More than 3 days").await.unwrap();

    let restored = restore(&server, &store);
    assert_eq!(restored.diagnostic_state().await, DiagnosticState::Idle);
}

#[tokio::test]
async fn test_terminal_steps_resolve_the_session() {
    for (step, emergency) in [("review_diagnosis", false), ("emergency_referral", true)] {
        let (server, controller, _store) = setup().await;
        start_diagnosing(&server, &controller).await;

        Mock::given(method("POST"))
            .and(path("/v2/h/st-marys/answer-adaptive-question"))
            .respond_with(ResponseTemplate::new(200).set_body_json(MockHospitalResponses::diagnosis_response(step)))
            .mount(&server)
            .await;

        let appended = controller.send_message("More than 3 days").await.unwrap();

        assert_eq!(appended.len(), 2);
        assert_matches!(
            &appended[1].payload,
            Some(MessagePayload::Diagnosis(result)) if result.is_emergency() == emergency
        );
        assert_matches!(
            controller.diagnostic_state().await,
            DiagnosticState::Resolved { outcome, .. } if outcome.as_str() == step
        );
    }
}

#[tokio::test]
async fn test_answer_failure_keeps_question_pending() {
    let (server, controller, _store) = setup().await;
    start_diagnosing(&server, &controller).await;
    let before = controller.diagnostic_state().await;

    Mock::given(method("POST"))
        .and(path("/v2/h/st-marys/answer-adaptive-question"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let appended = controller.send_message("1-3 days").await.unwrap();

    assert_eq!(appended.last().unwrap().content, ANSWER_FAILED);
    assert_eq!(controller.diagnostic_state().await, before);
}

#[tokio::test]
async fn test_recommendation_failures_apologise() {
    let (server, controller, _store) = setup().await;
    start_diagnosing(&server, &controller).await;
    let before = controller.diagnostic_state().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/tests/recommendations/.+"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/recommend-doctors"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tests = controller.send_message("book medical tests").await.unwrap();
    assert_eq!(tests.last().unwrap().content, TESTS_FAILED);

    let doctors = controller.send_message("book an appointment").await.unwrap();
    assert_eq!(doctors.last().unwrap().content, DOCTORS_FAILED);

    assert_eq!(controller.diagnostic_state().await, before);
}

#[tokio::test]
async fn test_test_booking_failure_keeps_form() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("POST"))
        .and(path("/h/st-marys/book-tests"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let form = controller.select_tests(recommended_tests()).await;
    let appended = controller
        .submit_test_booking(form.id(), test_booking_submission())
        .await
        .unwrap();

    assert_eq!(appended[0].content, TEST_BOOKING_FAILED);
    assert!(controller.messages().await.iter().any(|m| m.id() == form.id()));
    assert_eq!(controller.diagnostic_state().await, DiagnosticState::Idle);
}

#[tokio::test]
async fn test_reschedule_failure_keeps_form() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/reschedule-appointment"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let form = controller.open_reschedule_form(appointment(5)).await;
    let appended = controller
        .submit_reschedule(
            form.id(),
            RescheduleSubmission {
                appointment_id: Some(5),
                new_date: NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
                new_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            },
        )
        .await
        .unwrap();

    assert_eq!(appended[0].content, RESCHEDULE_FAILED);
    assert!(controller.messages().await.iter().any(|m| m.id() == form.id()));
}

#[tokio::test]
async fn test_invalid_cancellation_ids_make_no_call() {
    let (server, controller, _store) = setup().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for id in [None, Some(0)] {
        let appended = controller.cancel_appointment(id).await.unwrap();
        assert_eq!(appended[0].content, INVALID_APPOINTMENT_ID);
    }

    let appended = controller.cancel_test_booking("  ").await.unwrap();
    assert_eq!(appended[0].content, INVALID_BOOKING_ID);
    assert!(!controller.is_loading().await);
}
