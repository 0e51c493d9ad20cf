use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub session_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl UserInfo {
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Partial update for [`UserInfo`]; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfoUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntryKind {
    Diagnosis,
    Appointment,
    TestBooking,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientHistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryEntryKind,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub severity: Option<String>,
    pub doctor_name: Option<String>,
    pub notes: Option<String>,
}

/// A history entry before the store has assigned its id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatientHistoryEntry {
    pub kind: HistoryEntryKind,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub severity: Option<String>,
    pub doctor_name: Option<String>,
    pub notes: Option<String>,
}

impl NewPatientHistoryEntry {
    pub fn diagnosis(symptoms: &str, diagnosis: &str) -> Self {
        Self {
            kind: HistoryEntryKind::Diagnosis,
            symptoms: non_empty(symptoms),
            diagnosis: non_empty(diagnosis),
            severity: None,
            doctor_name: None,
            notes: None,
        }
    }

    pub fn appointment(symptoms: Option<&str>, doctor_name: &str) -> Self {
        Self {
            kind: HistoryEntryKind::Appointment,
            symptoms: symptoms.and_then(non_empty),
            diagnosis: None,
            severity: None,
            doctor_name: non_empty(doctor_name),
            notes: None,
        }
    }

    pub fn test_booking(symptoms: Option<&str>, tests: &[String]) -> Self {
        Self {
            kind: HistoryEntryKind::TestBooking,
            symptoms: symptoms.and_then(non_empty),
            diagnosis: None,
            severity: None,
            doctor_name: None,
            notes: non_empty(&tests.join(", ")),
        }
    }

    pub fn with_severity(mut self, severity: Option<String>) -> Self {
        self.severity = severity;
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One persisted chat turn, stored as plain strings so the log stays readable
/// independently of the live message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub id: String,
    pub role: String,
    pub message_type: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Full dump of the session records. On import, `None` fields leave the
/// stored record untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_history: Option<Vec<PatientHistoryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ConversationEntry>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub patient_history_removed: usize,
    pub conversation_removed: usize,
}
