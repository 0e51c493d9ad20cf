use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use session_cell::ConversationEntry;
use shared_utils::generate_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "diagnostic_question")]
    DiagnosticQuestion,
    #[serde(rename = "diagnostic_result")]
    DiagnosticResult,
    #[serde(rename = "doctors")]
    Doctors,
    #[serde(rename = "tests")]
    Tests,
    #[serde(rename = "appointment-form")]
    AppointmentForm,
    #[serde(rename = "appointment-success")]
    AppointmentSuccess,
    #[serde(rename = "test_form")]
    TestForm,
    #[serde(rename = "test-success")]
    TestSuccess,
    #[serde(rename = "reschedule-form")]
    RescheduleForm,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::DiagnosticQuestion => "diagnostic_question",
            MessageType::DiagnosticResult => "diagnostic_result",
            MessageType::Doctors => "doctors",
            MessageType::Tests => "tests",
            MessageType::AppointmentForm => "appointment-form",
            MessageType::AppointmentSuccess => "appointment-success",
            MessageType::TestForm => "test_form",
            MessageType::TestSuccess => "test-success",
            MessageType::RescheduleForm => "reschedule-form",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let parsed = match s {
            "text" => MessageType::Text,
            "diagnostic_question" => MessageType::DiagnosticQuestion,
            "diagnostic_result" => MessageType::DiagnosticResult,
            "doctors" => MessageType::Doctors,
            "tests" => MessageType::Tests,
            "appointment-form" => MessageType::AppointmentForm,
            "appointment-success" => MessageType::AppointmentSuccess,
            "test_form" => MessageType::TestForm,
            "test-success" => MessageType::TestSuccess,
            "reschedule-form" => MessageType::RescheduleForm,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn is_form(&self) -> bool {
        matches!(
            self,
            MessageType::AppointmentForm | MessageType::TestForm | MessageType::RescheduleForm
        )
    }
}

/// Accepts `"q1"` or `1` for identifiers the API is loose about.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

fn default_question_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticQuestion {
    #[serde(alias = "question_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "text", alias = "question_text")]
    pub question: String,
    #[serde(default = "default_question_type", alias = "type")]
    pub question_type: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A question shown to the patient, tied to the diagnostic session asking it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingQuestion {
    pub session_id: String,
    pub symptoms: String,
    pub question: DiagnosticQuestion,
}

/// How the adaptive-question endpoint wants the conversation to continue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum NextStep {
    AnswerQuestion,
    ContinueDiagnostic,
    ProvideDiagnosis,
    ReviewDiagnosis,
    EmergencyReferral,
    #[default]
    Unknown,
}

impl NextStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextStep::AnswerQuestion => "answer_question",
            NextStep::ContinueDiagnostic => "continue_diagnostic",
            NextStep::ProvideDiagnosis => "provide_diagnosis",
            NextStep::ReviewDiagnosis => "review_diagnosis",
            NextStep::EmergencyReferral => "emergency_referral",
            NextStep::Unknown => "unknown",
        }
    }

    pub fn expects_answer(&self) -> bool {
        matches!(self, NextStep::AnswerQuestion | NextStep::ContinueDiagnostic)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NextStep::ProvideDiagnosis | NextStep::ReviewDiagnosis | NextStep::EmergencyReferral
        )
    }
}

impl From<String> for NextStep {
    fn from(value: String) -> Self {
        match value.as_str() {
            "answer_question" => NextStep::AnswerQuestion,
            "continue_diagnostic" => NextStep::ContinueDiagnostic,
            "provide_diagnosis" => NextStep::ProvideDiagnosis,
            "review_diagnosis" => NextStep::ReviewDiagnosis,
            "emergency_referral" => NextStep::EmergencyReferral,
            _ => NextStep::Unknown,
        }
    }
}

impl From<NextStep> for String {
    fn from(value: NextStep) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartDiagnosticResponse {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_question: Option<DiagnosticQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerQuestionResponse {
    #[serde(default)]
    pub next_step: NextStep,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_question: Option<DiagnosticQuestion>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticResult {
    pub outcome: NextStep,
    pub summary: String,
    pub condition: Option<String>,
    pub severity: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub details: Value,
}

impl DiagnosticResult {
    pub fn from_response(response: &AnswerQuestionResponse) -> Self {
        let diagnosis = response.extra.get("diagnosis");

        let condition = match diagnosis {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Object(fields)) => ["condition", "name", "primary_diagnosis"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        };

        let severity = diagnosis
            .and_then(|d| d.get("severity"))
            .or_else(|| response.extra.get("severity"))
            .or_else(|| response.extra.get("urgency"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let recommendations = response
            .extra
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        let summary = response
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| condition.clone())
            .unwrap_or_else(|| "Assessment complete.".to_string());

        Self {
            outcome: response.next_step,
            summary,
            condition,
            severity,
            recommendations,
            details: Value::Object(response.extra.clone()),
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.outcome == NextStep::EmergencyReferral
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "doctor_name")]
    pub name: String,
    #[serde(default, alias = "specialization")]
    pub specialty: Option<String>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub available_slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRecommendation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "test_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "cost")]
    pub price: Option<f64>,
    #[serde(default, alias = "preparation_instructions")]
    pub preparation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub recent_symptoms: Option<String>,
}

/// Returning-patient data found by the external phone lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhoneRecognitionState {
    pub patient_profile: Option<PatientProfile>,
    pub smart_welcome: Option<Value>,
}

impl PhoneRecognitionState {
    pub fn is_recognized(&self) -> bool {
        self.patient_profile.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentForm {
    pub doctor: Doctor,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub symptoms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentSubmission {
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRequest {
    pub session_id: String,
    pub doctor_id: Option<i64>,
    pub doctor_name: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub symptoms: String,
    pub patient_context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentRecord {
    pub id: i64,
    pub doctor_name: String,
    pub patient_name: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestForm {
    pub tests: Vec<TestRecommendation>,
    pub patient_name: String,
    pub patient_phone: String,
    pub symptoms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestBookingSubmission {
    pub patient_name: String,
    pub patient_phone: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestBookingRequest {
    pub session_id: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub test_ids: Vec<i64>,
    pub test_names: Vec<String>,
    pub preferred_date: String,
    pub preferred_time: String,
    pub symptoms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestBookingRecord {
    pub booking_id: String,
    pub message: String,
    pub tests_booked: Vec<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub total_cost: Option<f64>,
    pub preparation_instructions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleForm {
    pub appointment: AppointmentRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleSubmission {
    pub appointment_id: Option<i64>,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    Question(PendingQuestion),
    Diagnosis(DiagnosticResult),
    Doctors(Vec<Doctor>),
    Tests(Vec<TestRecommendation>),
    AppointmentForm(AppointmentForm),
    Appointment(AppointmentRecord),
    TestForm(TestForm),
    TestBooking(TestBookingRecord),
    RescheduleForm(RescheduleForm),
}

/// One chat turn. `id` and `timestamp` are fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    id: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
}

impl Message {
    fn new(role: Role, message_type: MessageType, content: String, payload: Option<MessagePayload>) -> Self {
        Self {
            id: generate_id("msg"),
            role,
            message_type,
            content,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageType::Text, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageType::Text, content.into(), None)
    }

    pub fn with_payload(message_type: MessageType, content: impl Into<String>, payload: MessagePayload) -> Self {
        Self::new(Role::Assistant, message_type, content.into(), Some(payload))
    }

    pub fn question(session_id: &str, symptoms: &str, question: DiagnosticQuestion) -> Self {
        let content = question.question.clone();
        let pending = PendingQuestion {
            session_id: session_id.to_string(),
            symptoms: symptoms.to_string(),
            question,
        };
        Self::with_payload(MessageType::DiagnosticQuestion, content, MessagePayload::Question(pending))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn to_entry(&self) -> ConversationEntry {
        ConversationEntry {
            id: self.id.clone(),
            role: self.role.as_str().to_string(),
            message_type: self.message_type.as_str().to_string(),
            content: self.content.clone(),
            timestamp: self.timestamp,
            payload: self.payload.as_ref().and_then(|p| serde_json::to_value(p).ok()),
        }
    }

    /// Rebuilds a message from the persisted log; `None` for unknown roles or types.
    pub fn from_entry(entry: &ConversationEntry) -> Option<Self> {
        Some(Self {
            id: entry.id.clone(),
            role: Role::parse(&entry.role)?,
            message_type: MessageType::parse(&entry.message_type)?,
            content: entry.content.clone(),
            timestamp: entry.timestamp,
            payload: entry
                .payload
                .clone()
                .and_then(|raw| serde_json::from_value(raw).ok()),
        })
    }
}

/// Where the adaptive diagnostic conversation stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DiagnosticState {
    #[default]
    Idle,
    Diagnosing {
        session_id: String,
        symptoms: String,
        question: Option<DiagnosticQuestion>,
    },
    Resolved {
        session_id: String,
        symptoms: String,
        outcome: NextStep,
    },
}

impl DiagnosticState {
    /// Rebuilds the state a transcript was left in: diagnosing if its latest
    /// diagnostic message is an unanswered question, idle otherwise.
    pub fn from_transcript(messages: &[Message]) -> Self {
        let latest = messages.iter().rev().find(|m| {
            matches!(
                m.message_type,
                MessageType::DiagnosticQuestion | MessageType::DiagnosticResult
            )
        });

        match latest.and_then(|m| m.payload.as_ref()) {
            Some(MessagePayload::Question(pending)) => DiagnosticState::Diagnosing {
                session_id: pending.session_id.clone(),
                symptoms: pending.symptoms.clone(),
                question: Some(pending.question.clone()),
            },
            _ => DiagnosticState::Idle,
        }
    }

    pub fn is_diagnosing(&self) -> bool {
        matches!(self, DiagnosticState::Diagnosing { .. })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            DiagnosticState::Idle => None,
            DiagnosticState::Diagnosing { session_id, .. } | DiagnosticState::Resolved { session_id, .. } => {
                Some(session_id.as_str())
            }
        }
    }

    pub fn symptoms(&self) -> Option<&str> {
        match self {
            DiagnosticState::Idle => None,
            DiagnosticState::Diagnosing { symptoms, .. } | DiagnosticState::Resolved { symptoms, .. } => {
                Some(symptoms.as_str())
            }
        }
    }

    pub fn current_question(&self) -> Option<&DiagnosticQuestion> {
        match self {
            DiagnosticState::Diagnosing { question, .. } => question.as_ref(),
            _ => None,
        }
    }

    pub fn current_question_id(&self) -> Option<&str> {
        self.current_question().map(|q| q.id.as_str())
    }

    /// Session and question awaiting an answer, if any.
    pub fn pending(&self) -> Option<(&str, &DiagnosticQuestion)> {
        match self {
            DiagnosticState::Diagnosing { session_id, question: Some(question), .. } => {
                Some((session_id.as_str(), question))
            }
            _ => None,
        }
    }
}
