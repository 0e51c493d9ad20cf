use chrono::{DateTime, Utc};

use crate::models::PatientHistoryEntry;
use crate::services::store::SessionStore;

pub const NEW_PATIENT_CONTEXT: &str = "New patient - no previous medical history available.";

pub const CHRONIC_CONDITION_KEYWORDS: [&str; 6] =
    ["chronic", "diabetes", "hypertension", "asthma", "arthritis", "migraine"];

const CONTEXT_SYMPTOM_LIMIT: usize = 5;
const CONTEXT_DIAGNOSIS_LIMIT: usize = 3;

/// Keeps the first occurrence of each value (case-insensitive), in order.
fn dedup_in_order<'a>(values: impl Iterator<Item = &'a str>, limit: Option<usize>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();

    for value in values.map(str::trim).filter(|v| !v.is_empty()) {
        let folded = value.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(value.to_string());

        if limit.is_some_and(|limit| out.len() >= limit) {
            break;
        }
    }

    out
}

pub fn recent_symptoms(history: &[PatientHistoryEntry], limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    dedup_in_order(history.iter().filter_map(|e| e.symptoms.as_deref()), Some(limit))
}

pub fn recent_diagnoses(history: &[PatientHistoryEntry], limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    dedup_in_order(history.iter().filter_map(|e| e.diagnosis.as_deref()), Some(limit))
}

pub fn is_chronic_condition(diagnosis: &str) -> bool {
    let lowered = diagnosis.to_lowercase();
    CHRONIC_CONDITION_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

pub fn chronic_conditions(history: &[PatientHistoryEntry]) -> Vec<String> {
    dedup_in_order(
        history
            .iter()
            .filter_map(|e| e.diagnosis.as_deref())
            .filter(|d| is_chronic_condition(d)),
        None,
    )
}

impl SessionStore {
    pub fn get_recent_symptoms(&self, limit: usize) -> Vec<String> {
        recent_symptoms(&self.get_patient_history(), limit)
    }

    pub fn get_recent_diagnoses(&self, limit: usize) -> Vec<String> {
        recent_diagnoses(&self.get_patient_history(), limit)
    }

    pub fn get_chronic_conditions(&self) -> Vec<String> {
        chronic_conditions(&self.get_patient_history())
    }

    /// Plain-text patient summary sent along with outbound requests.
    pub fn generate_patient_context(&self) -> String {
        self.generate_patient_context_at(Utc::now())
    }

    pub fn generate_patient_context_at(&self, now: DateTime<Utc>) -> String {
        let history = self.get_patient_history();
        if history.is_empty() {
            return NEW_PATIENT_CONTEXT.to_string();
        }

        let mut lines = Vec::new();

        if let Some(user) = self.get_user_info() {
            if let Some(name) = user.full_name() {
                lines.push(format!("Patient: {}", name));
            }
            if let Some(age) = user.age {
                lines.push(format!("Age: {}", age));
            }
            if let Some(gender) = user.gender.as_deref().filter(|g| !g.is_empty()) {
                lines.push(format!("Gender: {}", gender));
            }
        }

        let days_since = (now - history[0].timestamp).num_days().max(0);
        lines.push(format!("Days since last visit: {}", days_since));
        lines.push(format!("Previous visits: {}", history.len()));

        let chronic = chronic_conditions(&history);
        if !chronic.is_empty() {
            lines.push(format!("Chronic conditions: {}", chronic.join(", ")));
        }

        let symptoms = recent_symptoms(&history, CONTEXT_SYMPTOM_LIMIT);
        if !symptoms.is_empty() {
            lines.push(format!("Recent symptoms: {}", symptoms.join("; ")));
        }

        let diagnoses = recent_diagnoses(&history, CONTEXT_DIAGNOSIS_LIMIT);
        if !diagnoses.is_empty() {
            lines.push(format!("Recent diagnoses: {}", diagnoses.join("; ")));
        }

        lines.join("\n")
    }
}
