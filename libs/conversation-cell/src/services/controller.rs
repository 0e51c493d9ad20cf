use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use session_cell::{NewPatientHistoryEntry, SessionStore, UserInfoUpdate};
use shared_config::AppConfig;
use shared_utils::generate_session_id;

use crate::error::ConversationError;
use crate::models::{
    AnswerQuestionResponse, AppointmentForm, AppointmentRecord, AppointmentRequest,
    AppointmentSubmission, DiagnosticQuestion, DiagnosticResult, DiagnosticState, Doctor, Message,
    MessagePayload, MessageType, PatientProfile, PhoneRecognitionState, RescheduleForm,
    RescheduleSubmission, TestBookingRequest, TestBookingSubmission, TestForm, TestRecommendation,
};
use crate::services::booking::{validate_appointment_id, validate_booking_id, BookingService};
use crate::services::diagnostic::DiagnosticService;
use crate::services::intent::{classify, Intent, ONBOARDING_PROMPT};
use crate::services::recommendation::RecommendationService;

pub const WELCOME_MESSAGE: &str = "👋 Hello! I'm your hospital assistant. Tell me about your symptoms \
and I'll ask a few questions, suggest doctors or medical tests, and help you book an appointment.";

pub const START_DIAGNOSTIC_FAILED: &str =
    "❌ Sorry, I couldn't start the symptom assessment right now. Please try again in a moment.";
pub const ANSWER_FAILED: &str = "❌ Sorry, I couldn't process your answer. Please try again.";
pub const TESTS_FAILED: &str = "❌ Sorry, I couldn't fetch test recommendations right now. Please try again.";
pub const DOCTORS_FAILED: &str = "❌ Sorry, I couldn't find doctors for you right now. Please try again.";
pub const APPOINTMENT_FAILED: &str = "❌ Sorry, there was an error booking your appointment. Please try again.";
pub const TEST_BOOKING_FAILED: &str = "❌ Sorry, there was an error booking your tests. Please try again.";
pub const RESCHEDULE_FAILED: &str = "❌ Sorry, there was an error rescheduling your appointment. Please try again.";
pub const INVALID_APPOINTMENT_ID: &str = "❌ Invalid appointment ID. Please choose a valid appointment and try again.";
pub const INVALID_BOOKING_ID: &str = "❌ Invalid test booking ID. Please choose a valid booking and try again.";
pub const MISSING_CONTACT_DETAILS: &str = "❌ Please provide your name and phone number to complete the booking.";
pub const NO_TESTS_FOUND: &str =
    "I couldn't find specific tests for these symptoms. A doctor can advise you on what's needed.";
pub const NO_DOCTORS_FOUND: &str =
    "I couldn't find an available doctor for these symptoms right now. Please try again later.";

#[derive(Debug, Clone, Copy)]
struct RequestToken {
    epoch: u64,
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<Message>,
    diagnostic: DiagnosticState,
    recognition: PhoneRecognitionState,
    last_symptoms: Option<String>,
    loading: bool,
    epoch: u64,
}

impl ChatState {
    /// Appends to the live transcript and mirrors into the persisted log.
    fn push(&mut self, store: &SessionStore, message: Message) -> Message {
        store.add_conversation_entry(message.to_entry());
        self.messages.push(message.clone());
        message
    }

    /// Removes from both the live transcript and the persisted log, so a
    /// submitted form does not come back on restore.
    fn remove(&mut self, store: &SessionStore, message_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id() == message_id)?;
        store.remove_conversation_entry(message_id);
        Some(self.messages.remove(index))
    }

    fn payload_of(&self, message_id: &str) -> Option<&MessagePayload> {
        self.messages
            .iter()
            .find(|m| m.id() == message_id)
            .and_then(|m| m.payload.as_ref())
    }

    fn symptoms(&self, store: &SessionStore) -> Option<String> {
        self.diagnostic
            .symptoms()
            .map(str::to_string)
            .or_else(|| self.last_symptoms.clone())
            .or_else(|| self.recognition.patient_profile.as_ref().and_then(|p| p.recent_symptoms.clone()))
            .or_else(|| store.get_recent_symptoms(1).into_iter().next())
    }

    fn contact_details(&self, store: &SessionStore) -> (String, String) {
        let profile = self.recognition.patient_profile.as_ref();
        let user = store.get_user_info();

        let name = profile
            .and_then(|p| p.name.clone())
            .or_else(|| user.as_ref().and_then(|u| u.full_name()))
            .unwrap_or_default();
        let phone = profile
            .and_then(|p| p.phone.clone())
            .or_else(|| user.as_ref().and_then(|u| u.phone.clone()))
            .unwrap_or_default();

        (name, phone)
    }

    /// A completed booking closes out a resolved diagnosis.
    fn finish_booking(&mut self) {
        if let DiagnosticState::Resolved { symptoms, .. } = &self.diagnostic {
            self.last_symptoms = Some(symptoms.clone());
            self.diagnostic = DiagnosticState::Idle;
        }
    }
}

/// Drives one chat session: classifies user turns, calls the hospital API,
/// and keeps the transcript in memory and in the session store.
///
/// Network-bound handlers are serialized by a loading flag: while one is in
/// flight, others fail with [`ConversationError::Busy`]. Each handler holds a
/// token tied to the current chat epoch, and [`clear_chat`](Self::clear_chat)
/// advances the epoch so late responses are dropped rather than applied to
/// the new session.
pub struct ConversationController {
    store: Arc<SessionStore>,
    diagnostics: DiagnosticService,
    recommendations: RecommendationService,
    booking: BookingService,
    state: RwLock<ChatState>,
}

impl ConversationController {
    pub fn new(config: &AppConfig, store: Arc<SessionStore>) -> Self {
        let mut state = ChatState::default();

        let history = store.get_conversation_history();
        state.messages = history.iter().filter_map(Message::from_entry).collect();

        if state.messages.is_empty() {
            state.push(&store, Message::assistant(WELCOME_MESSAGE));
        } else {
            state.diagnostic = DiagnosticState::from_transcript(&state.messages);
            state.last_symptoms = state.diagnostic.symptoms().map(str::to_string);
            info!(
                "Restored {} messages from the conversation log (diagnosing: {})",
                state.messages.len(),
                state.diagnostic.is_diagnosing()
            );
        }

        Self {
            diagnostics: DiagnosticService::new(config),
            recommendations: RecommendationService::new(config),
            booking: BookingService::new(config),
            store,
            state: RwLock::new(state),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    pub async fn diagnostic_state(&self) -> DiagnosticState {
        self.state.read().await.diagnostic.clone()
    }

    pub async fn recognition(&self) -> PhoneRecognitionState {
        self.state.read().await.recognition.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    async fn begin_request(&self) -> Result<RequestToken, ConversationError> {
        let mut state = self.state.write().await;
        if state.loading {
            warn!("Rejecting request while another is in flight");
            return Err(ConversationError::Busy);
        }
        state.loading = true;
        Ok(RequestToken { epoch: state.epoch })
    }

    async fn finish_request(&self, token: RequestToken) {
        let mut state = self.state.write().await;
        if state.epoch == token.epoch {
            state.loading = false;
        }
    }

    /// Runs `handler` with the loading flag held, releasing it on every path.
    async fn run<F, Fut>(&self, handler: F) -> Result<Vec<Message>, ConversationError>
    where
        F: FnOnce(RequestToken) -> Fut,
        Fut: Future<Output = Result<Vec<Message>, ConversationError>>,
    {
        let token = self.begin_request().await?;
        let outcome = handler(token).await;
        self.finish_request(token).await;
        outcome
    }

    /// Applies `f` only if the chat has not been cleared since `token` was issued.
    async fn apply<T>(
        &self,
        token: RequestToken,
        f: impl FnOnce(&mut ChatState, &SessionStore) -> T,
    ) -> Result<T, ConversationError> {
        let mut state = self.state.write().await;
        if state.epoch != token.epoch {
            debug!("Dropping stale response from epoch {}", token.epoch);
            return Err(ConversationError::Superseded);
        }
        Ok(f(&mut state, &self.store))
    }

    async fn say(&self, token: RequestToken, text: &str) -> Result<Vec<Message>, ConversationError> {
        self.apply(token, |state, store| vec![state.push(store, Message::assistant(text))])
            .await
    }

    pub async fn send_message(&self, content: &str) -> Result<Vec<Message>, ConversationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        self.run(|token| self.handle_user_turn(token, content)).await
    }

    async fn handle_user_turn(&self, token: RequestToken, content: &str) -> Result<Vec<Message>, ConversationError> {
        let (user_message, intent, diagnostic) = self
            .apply(token, |state, store| {
                let message = state.push(store, Message::user(content));
                (message, classify(content, &state.diagnostic), state.diagnostic.clone())
            })
            .await?;

        debug!("User turn classified as {:?}", intent);

        let replies = match intent {
            Intent::BookTests => self.handle_book_tests(token, content).await?,
            Intent::BookAppointment => self.handle_book_appointment(token, content).await?,
            Intent::AnswerQuestion => match diagnostic.pending() {
                Some((session_id, question)) => {
                    self.handle_answer(token, session_id, diagnostic.symptoms().unwrap_or(content), question, content)
                        .await?
                }
                None => self.handle_symptoms(token, content).await?,
            },
            Intent::SmallTalk => self.say(token, ONBOARDING_PROMPT).await?,
            Intent::DescribeSymptoms => self.handle_symptoms(token, content).await?,
        };

        let mut appended = vec![user_message];
        appended.extend(replies);
        Ok(appended)
    }

    async fn handle_symptoms(&self, token: RequestToken, symptoms: &str) -> Result<Vec<Message>, ConversationError> {
        let session_id = generate_session_id();

        let response = match self.diagnostics.start_session(symptoms, &session_id).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to start diagnostic session: {}", e);
                return self.say(token, START_DIAGNOSTIC_FAILED).await;
            }
        };

        self.apply(token, |state, store| {
            let mut appended = Vec::new();

            if let Some(text) = response.message.as_deref().filter(|m| !m.trim().is_empty()) {
                appended.push(state.push(store, Message::assistant(text)));
            }
            if let Some(question) = response.current_question.clone() {
                appended.push(state.push(store, Message::question(&response.session_id, symptoms, question)));
            }

            info!("Diagnostic session {} in progress", response.session_id);
            state.last_symptoms = Some(symptoms.to_string());
            state.diagnostic = DiagnosticState::Diagnosing {
                session_id: response.session_id,
                symptoms: symptoms.to_string(),
                question: response.current_question,
            };
            appended
        })
        .await
    }

    async fn handle_answer(
        &self,
        token: RequestToken,
        session_id: &str,
        symptoms: &str,
        question: &DiagnosticQuestion,
        answer: &str,
    ) -> Result<Vec<Message>, ConversationError> {
        let response = match self.diagnostics.answer_question(session_id, question, answer).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to submit answer for question {}: {}", question.id, e);
                return self.say(token, ANSWER_FAILED).await;
            }
        };

        self.apply(token, |state, store| {
            apply_answer(state, store, session_id, symptoms, response)
        })
        .await
    }

    async fn handle_book_tests(&self, token: RequestToken, content: &str) -> Result<Vec<Message>, ConversationError> {
        let symptoms = self
            .apply(token, |state, store| state.symptoms(store).unwrap_or_else(|| content.to_string()))
            .await?;

        match self.recommendations.recommend_tests(&symptoms).await {
            Ok(tests) if tests.is_empty() => self.say(token, NO_TESTS_FOUND).await,
            Ok(tests) => {
                self.apply(token, |state, store| {
                    vec![state.push(
                        store,
                        Message::with_payload(
                            MessageType::Tests,
                            "Based on your symptoms, these medical tests are recommended:",
                            MessagePayload::Tests(tests),
                        ),
                    )]
                })
                .await
            }
            Err(e) => {
                error!("Failed to fetch test recommendations: {}", e);
                self.say(token, TESTS_FAILED).await
            }
        }
    }

    async fn handle_book_appointment(&self, token: RequestToken, content: &str) -> Result<Vec<Message>, ConversationError> {
        let symptoms = self
            .apply(token, |state, store| state.symptoms(store).unwrap_or_else(|| content.to_string()))
            .await?;

        match self.recommendations.recommend_doctors(&symptoms).await {
            Ok(doctors) if doctors.is_empty() => self.say(token, NO_DOCTORS_FOUND).await,
            Ok(doctors) => {
                self.apply(token, |state, store| {
                    vec![state.push(
                        store,
                        Message::with_payload(
                            MessageType::Doctors,
                            "Here are doctors who can help with your symptoms:",
                            MessagePayload::Doctors(doctors),
                        ),
                    )]
                })
                .await
            }
            Err(e) => {
                error!("Failed to fetch doctor recommendations: {}", e);
                self.say(token, DOCTORS_FAILED).await
            }
        }
    }

    /// Opens an appointment form for `doctor`, prefilled from what is known
    /// about the patient.
    pub async fn select_doctor(&self, doctor: Doctor) -> Message {
        let mut state = self.state.write().await;
        let (patient_name, patient_phone) = state.contact_details(&self.store);
        let form = AppointmentForm {
            patient_email: state.recognition.patient_profile.as_ref().and_then(|p| p.email.clone()),
            symptoms: state.symptoms(&self.store).unwrap_or_default(),
            doctor,
            patient_name,
            patient_phone,
        };

        let content = format!("Book an appointment with {}", form.doctor.name);
        state.push(
            &self.store,
            Message::with_payload(MessageType::AppointmentForm, content, MessagePayload::AppointmentForm(form)),
        )
    }

    pub async fn select_tests(&self, tests: Vec<TestRecommendation>) -> Message {
        let mut state = self.state.write().await;
        let (patient_name, patient_phone) = state.contact_details(&self.store);
        let form = TestForm {
            symptoms: state.symptoms(&self.store).unwrap_or_default(),
            tests,
            patient_name,
            patient_phone,
        };

        let content = format!("Book {} medical test(s)", form.tests.len());
        state.push(
            &self.store,
            Message::with_payload(MessageType::TestForm, content, MessagePayload::TestForm(form)),
        )
    }

    pub async fn open_reschedule_form(&self, appointment: AppointmentRecord) -> Message {
        let mut state = self.state.write().await;
        let content = format!("Reschedule your appointment with {}", appointment.doctor_name);
        state.push(
            &self.store,
            Message::with_payload(
                MessageType::RescheduleForm,
                content,
                MessagePayload::RescheduleForm(RescheduleForm { appointment }),
            ),
        )
    }

    pub async fn submit_appointment(
        &self,
        form_id: &str,
        submission: AppointmentSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        self.run(|token| self.handle_appointment_submission(token, form_id, submission)).await
    }

    async fn handle_appointment_submission(
        &self,
        token: RequestToken,
        form_id: &str,
        submission: AppointmentSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        if submission.patient_name.trim().is_empty() || submission.patient_phone.trim().is_empty() {
            return self.say(token, MISSING_CONTACT_DETAILS).await;
        }

        let request = self
            .apply(token, |state, store| {
                let form = match state.payload_of(form_id) {
                    Some(MessagePayload::AppointmentForm(form)) => form.clone(),
                    _ => return None,
                };
                Some(AppointmentRequest {
                    session_id: store.get_session_id(),
                    doctor_id: form.doctor.id,
                    doctor_name: form.doctor.name,
                    patient_name: submission.patient_name.trim().to_string(),
                    patient_phone: submission.patient_phone.trim().to_string(),
                    patient_email: submission.patient_email.clone().or(form.patient_email),
                    appointment_date: submission.appointment_date.format("%Y-%m-%d").to_string(),
                    appointment_time: submission.appointment_time.format("%H:%M").to_string(),
                    symptoms: submission.symptoms.clone().unwrap_or(form.symptoms),
                    patient_context: store.generate_patient_context(),
                })
            })
            .await?
            .ok_or_else(|| ConversationError::FormNotFound(form_id.to_string()))?;

        let record = match self.booking.book_appointment(&request).await {
            Ok(record) => record,
            Err(e) => {
                error!("Appointment booking failed: {}", e);
                return self.say(token, APPOINTMENT_FAILED).await;
            }
        };

        self.apply(token, |state, store| {
            state.remove(store, form_id);
            store.add_patient_history_entry(NewPatientHistoryEntry::appointment(
                Some(request.symptoms.as_str()),
                &record.doctor_name,
            ));
            state.finish_booking();

            let content = format!("✅ {}", record.message);
            vec![state.push(
                store,
                Message::with_payload(MessageType::AppointmentSuccess, content, MessagePayload::Appointment(record)),
            )]
        })
        .await
    }

    pub async fn submit_test_booking(
        &self,
        form_id: &str,
        submission: TestBookingSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        self.run(|token| self.handle_test_submission(token, form_id, submission)).await
    }

    async fn handle_test_submission(
        &self,
        token: RequestToken,
        form_id: &str,
        submission: TestBookingSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        if submission.patient_name.trim().is_empty() || submission.patient_phone.trim().is_empty() {
            return self.say(token, MISSING_CONTACT_DETAILS).await;
        }

        let prepared = self
            .apply(token, |state, store| {
                let form = match state.payload_of(form_id) {
                    Some(MessagePayload::TestForm(form)) => form.clone(),
                    _ => return None,
                };
                let prices: Vec<f64> = form.tests.iter().filter_map(|t| t.price).collect();
                let expected_cost = (!prices.is_empty()).then(|| prices.iter().sum::<f64>());

                let request = TestBookingRequest {
                    session_id: store.get_session_id(),
                    patient_name: submission.patient_name.trim().to_string(),
                    patient_phone: submission.patient_phone.trim().to_string(),
                    test_ids: form.tests.iter().filter_map(|t| t.id).collect(),
                    test_names: form.tests.iter().map(|t| t.name.clone()).collect(),
                    preferred_date: submission.preferred_date.format("%Y-%m-%d").to_string(),
                    preferred_time: submission.preferred_time.format("%H:%M").to_string(),
                    symptoms: form.symptoms,
                };
                Some((request, expected_cost))
            })
            .await?;
        let (request, expected_cost) =
            prepared.ok_or_else(|| ConversationError::FormNotFound(form_id.to_string()))?;

        let record = match self.booking.book_tests(&request, expected_cost).await {
            Ok(record) => record,
            Err(e) => {
                error!("Test booking failed: {}", e);
                return self.say(token, TEST_BOOKING_FAILED).await;
            }
        };

        self.apply(token, |state, store| {
            state.remove(store, form_id);
            store.add_patient_history_entry(NewPatientHistoryEntry::test_booking(
                Some(request.symptoms.as_str()),
                &record.tests_booked,
            ));
            state.finish_booking();

            let content = format!("✅ {}", record.message);
            vec![state.push(
                store,
                Message::with_payload(MessageType::TestSuccess, content, MessagePayload::TestBooking(record)),
            )]
        })
        .await
    }

    pub async fn submit_reschedule(
        &self,
        form_id: &str,
        submission: RescheduleSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        self.run(|token| self.handle_reschedule(token, form_id, submission)).await
    }

    async fn handle_reschedule(
        &self,
        token: RequestToken,
        form_id: &str,
        submission: RescheduleSubmission,
    ) -> Result<Vec<Message>, ConversationError> {
        let appointment_id = match validate_appointment_id(submission.appointment_id) {
            Ok(id) => id,
            Err(e) => {
                warn!("Reschedule rejected: {}", e);
                return self.say(token, INVALID_APPOINTMENT_ID).await;
            }
        };

        let previous = self
            .apply(token, |state, _| match state.payload_of(form_id) {
                Some(MessagePayload::RescheduleForm(form)) => Some(form.appointment.clone()),
                _ => None,
            })
            .await?
            .ok_or_else(|| ConversationError::FormNotFound(form_id.to_string()))?;

        let record = match self
            .booking
            .reschedule_appointment(appointment_id, submission.new_date, submission.new_time, Some(&previous))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!("Reschedule of appointment {} failed: {}", appointment_id, e);
                return self.say(token, RESCHEDULE_FAILED).await;
            }
        };

        self.apply(token, |state, store| {
            state.remove(store, form_id);
            let content = format!(
                "✅ Your appointment with {} is now on {} at {}.",
                record.doctor_name,
                record.appointment_date.as_deref().unwrap_or("the new date"),
                record.appointment_time.as_deref().unwrap_or("the new time"),
            );
            vec![state.push(
                store,
                Message::with_payload(MessageType::AppointmentSuccess, content, MessagePayload::Appointment(record)),
            )]
        })
        .await
    }

    pub async fn cancel_appointment(&self, appointment_id: Option<i64>) -> Result<Vec<Message>, ConversationError> {
        self.run(|token| async move {
            let appointment_id = match validate_appointment_id(appointment_id) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Cancellation rejected: {}", e);
                    return self.say(token, INVALID_APPOINTMENT_ID).await;
                }
            };

            match self.booking.cancel_appointment(appointment_id).await {
                Ok(message) => self.say(token, &format!("✅ {}", message)).await,
                Err(e) => {
                    error!("Cancellation of appointment {} failed: {}", appointment_id, e);
                    self.say(token, &format!("❌ Failed to cancel appointment: {}", e.user_message()))
                        .await
                }
            }
        })
        .await
    }

    pub async fn cancel_test_booking(&self, booking_id: &str) -> Result<Vec<Message>, ConversationError> {
        self.run(|token| async move {
            let booking_id = match validate_booking_id(booking_id) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Test cancellation rejected: {}", e);
                    return self.say(token, INVALID_BOOKING_ID).await;
                }
            };

            match self.booking.cancel_test_booking(booking_id).await {
                Ok(message) => self.say(token, &format!("✅ {}", message)).await,
                Err(e) => {
                    error!("Cancellation of test booking {} failed: {}", booking_id, e);
                    self.say(token, &format!("❌ Failed to cancel test booking: {}", e.user_message()))
                        .await
                }
            }
        })
        .await
    }

    /// Records a returning patient found by the phone lookup and copies
    /// their details into the stored user info.
    pub async fn recognize_patient(&self, profile: PatientProfile, smart_welcome: Option<serde_json::Value>) {
        let mut update = UserInfoUpdate {
            phone: profile.phone.clone(),
            age: profile.age,
            gender: profile.gender.clone(),
            ..Default::default()
        };
        if let Some(name) = profile.name.as_deref() {
            let mut parts = name.trim().splitn(2, ' ');
            update.first_name = parts.next().filter(|p| !p.is_empty()).map(str::to_string);
            update.last_name = parts.next().map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        }
        self.store.set_user_info(update);

        let mut state = self.state.write().await;
        info!("Returning patient recognized");
        state.recognition = PhoneRecognitionState {
            patient_profile: Some(profile),
            smart_welcome,
        };
    }

    /// Resets the transcript, diagnostic and recognition state and every
    /// stored record; returns the new session id.
    pub async fn clear_chat(&self) -> String {
        let mut state = self.state.write().await;

        let epoch = state.epoch + 1;
        *state = ChatState {
            epoch,
            ..ChatState::default()
        };

        let session_id = self.store.reset_session();
        state.push(&self.store, Message::assistant(WELCOME_MESSAGE));

        info!("Chat cleared, session {}", session_id);
        session_id
    }
}

fn apply_answer(
    state: &mut ChatState,
    store: &SessionStore,
    session_id: &str,
    symptoms: &str,
    response: AnswerQuestionResponse,
) -> Vec<Message> {
    let step = response.next_step;

    if step.expects_answer() {
        let Some(question) = response.current_question.clone() else {
            debug!("{} without a question, nothing to ask", step.as_str());
            return Vec::new();
        };

        let mut appended = Vec::new();
        if let Some(text) = response.message.as_deref().filter(|m| !m.trim().is_empty()) {
            appended.push(state.push(store, Message::assistant(text)));
        }
        appended.push(state.push(store, Message::question(session_id, symptoms, question.clone())));

        state.diagnostic = DiagnosticState::Diagnosing {
            session_id: session_id.to_string(),
            symptoms: symptoms.to_string(),
            question: Some(question),
        };
        return appended;
    }

    if step.is_terminal() {
        let result = DiagnosticResult::from_response(&response);
        info!("Diagnostic session {} resolved with {}", session_id, step.as_str());

        store.add_patient_history_entry(
            NewPatientHistoryEntry::diagnosis(symptoms, result.condition.as_deref().unwrap_or(&result.summary))
                .with_severity(result.severity.clone()),
        );

        state.last_symptoms = Some(symptoms.to_string());
        state.diagnostic = DiagnosticState::Resolved {
            session_id: session_id.to_string(),
            symptoms: symptoms.to_string(),
            outcome: step,
        };

        let content = result.summary.clone();
        return vec![state.push(
            store,
            Message::with_payload(MessageType::DiagnosticResult, content, MessagePayload::Diagnosis(result)),
        )];
    }

    debug!("Ignoring unrecognised next step for session {}", session_id);
    Vec::new()
}
