use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use shared_config::DEFAULT_STORAGE_NAMESPACE;
use shared_database::KeyValueStore;
use shared_utils::generate_id;

use crate::models::{
    CleanupReport, ConversationEntry, NewPatientHistoryEntry, PatientHistoryEntry, SessionSnapshot,
    UserInfo, UserInfoUpdate,
};

pub const MAX_PATIENT_HISTORY: usize = 50;
pub const MAX_CONVERSATION_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub session_id: String,
    pub user_info: String,
    pub patient_history: String,
    pub conversation_history: String,
}

impl StorageKeys {
    pub fn new(namespace: &str) -> Self {
        Self {
            session_id: format!("{}_session_id", namespace),
            user_info: format!("{}_user_info", namespace),
            patient_history: format!("{}_patient_history", namespace),
            conversation_history: format!("{}_conversation_history", namespace),
        }
    }

    pub fn all(&self) -> [&str; 4] {
        [
            &self.session_id,
            &self.user_info,
            &self.patient_history,
            &self.conversation_history,
        ]
    }
}

/// Session records for one client profile, persisted as JSON values.
///
/// Every read degrades to "no data" when the backend fails or a value does
/// not parse; every failed write is logged and dropped. Nothing here returns
/// an error to the caller.
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(backend, DEFAULT_STORAGE_NAMESPACE)
    }

    pub fn with_namespace(backend: Arc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            backend,
            keys: StorageKeys::new(namespace),
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding malformed data under {}: {}", key, e);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!("Failed to serialize {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.set(key, &serialized) {
            error!("Failed to write {}: {}", key, e);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            error!("Failed to remove {}: {}", key, e);
        }
    }

    pub fn get_session_id(&self) -> String {
        if let Some(id) = self.read_raw(&self.keys.session_id) {
            if !id.trim().is_empty() {
                return id;
            }
        }

        let id = generate_id("session");
        if let Err(e) = self.backend.set(&self.keys.session_id, &id) {
            error!("Failed to persist session id: {}", e);
        }
        debug!("Created session {}", id);
        id
    }

    /// Deletes every session record and starts a new session id.
    pub fn reset_session(&self) -> String {
        for key in self.keys.all() {
            self.remove(key);
        }

        let id = self.get_session_id();
        info!("Session reset, new session {}", id);
        id
    }

    pub fn get_user_info(&self) -> Option<UserInfo> {
        self.read_json(&self.keys.user_info)
    }

    pub fn set_user_info(&self, update: UserInfoUpdate) -> UserInfo {
        let now = Utc::now();
        let existing = self.get_user_info();

        let info = match existing {
            Some(current) => UserInfo {
                session_id: current.session_id,
                first_name: update.first_name.or(current.first_name),
                last_name: update.last_name.or(current.last_name),
                age: update.age.or(current.age),
                gender: update.gender.or(current.gender),
                phone: update.phone.or(current.phone),
                created_at: current.created_at,
                last_active: now,
            },
            None => UserInfo {
                session_id: self.get_session_id(),
                first_name: update.first_name,
                last_name: update.last_name,
                age: update.age,
                gender: update.gender,
                phone: update.phone,
                created_at: now,
                last_active: now,
            },
        };

        self.write_json(&self.keys.user_info, &info);
        info
    }

    /// Newest first.
    pub fn get_patient_history(&self) -> Vec<PatientHistoryEntry> {
        self.read_json(&self.keys.patient_history).unwrap_or_default()
    }

    pub fn add_patient_history_entry(&self, entry: NewPatientHistoryEntry) -> PatientHistoryEntry {
        let stored = PatientHistoryEntry {
            id: generate_id("history"),
            timestamp: Utc::now(),
            kind: entry.kind,
            symptoms: entry.symptoms,
            diagnosis: entry.diagnosis,
            severity: entry.severity,
            doctor_name: entry.doctor_name,
            notes: entry.notes,
        };

        let mut history = self.get_patient_history();
        history.insert(0, stored.clone());
        history.truncate(MAX_PATIENT_HISTORY);

        self.write_json(&self.keys.patient_history, &history);
        stored
    }

    /// Oldest first.
    pub fn get_conversation_history(&self) -> Vec<ConversationEntry> {
        self.read_json(&self.keys.conversation_history).unwrap_or_default()
    }

    pub fn add_conversation_entry(&self, entry: ConversationEntry) {
        let mut history = self.get_conversation_history();
        history.push(entry);

        if history.len() > MAX_CONVERSATION_HISTORY {
            let overflow = history.len() - MAX_CONVERSATION_HISTORY;
            history.drain(..overflow);
        }

        self.write_json(&self.keys.conversation_history, &history);
    }

    /// Drops one entry from the log; returns whether it was present.
    pub fn remove_conversation_entry(&self, entry_id: &str) -> bool {
        let mut history = self.get_conversation_history();
        let before = history.len();
        history.retain(|entry| entry.id != entry_id);

        if history.len() == before {
            return false;
        }
        self.write_json(&self.keys.conversation_history, &history);
        true
    }

    pub fn clear_conversation_history(&self) {
        self.remove(&self.keys.conversation_history);
    }

    pub fn export_session_data(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.read_raw(&self.keys.session_id),
            user_info: self.get_user_info(),
            patient_history: Some(self.get_patient_history()),
            conversation_history: Some(self.get_conversation_history()),
        }
    }

    pub fn import_session_data(&self, snapshot: SessionSnapshot) {
        if let Some(session_id) = snapshot.session_id {
            if let Err(e) = self.backend.set(&self.keys.session_id, &session_id) {
                error!("Failed to import session id: {}", e);
            }
        }
        if let Some(user_info) = snapshot.user_info {
            self.write_json(&self.keys.user_info, &user_info);
        }
        if let Some(history) = snapshot.patient_history {
            self.write_json(&self.keys.patient_history, &history);
        }
        if let Some(conversation) = snapshot.conversation_history {
            self.write_json(&self.keys.conversation_history, &conversation);
        }
        info!("Imported session data");
    }

    /// Characters held under the session keys, counting both key and value.
    pub fn get_storage_size(&self) -> usize {
        self.keys
            .all()
            .iter()
            .filter_map(|key| self.read_raw(key).map(|value| key.chars().count() + value.chars().count()))
            .sum()
    }

    /// A retention window too large to represent keeps everything.
    pub fn cleanup_old_data(&self, days_to_keep: i64) -> CleanupReport {
        let cutoff = Duration::try_days(days_to_keep)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or_else(|| {
                warn!("Retention of {} days is out of range, keeping all records", days_to_keep);
                DateTime::<Utc>::MIN_UTC
            });
        self.cleanup_older_than(cutoff)
    }

    pub fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let history = self.get_patient_history();
        if !history.is_empty() {
            let before = history.len();
            let kept: Vec<_> = history.into_iter().filter(|e| e.timestamp >= cutoff).collect();
            report.patient_history_removed = before - kept.len();
            self.write_json(&self.keys.patient_history, &kept);
        }

        let conversation = self.get_conversation_history();
        if !conversation.is_empty() {
            let before = conversation.len();
            let kept: Vec<_> = conversation.into_iter().filter(|e| e.timestamp >= cutoff).collect();
            report.conversation_removed = before - kept.len();
            self.write_json(&self.keys.conversation_history, &kept);
        }

        debug!(
            "Cleanup before {} removed {} history and {} conversation entries",
            cutoff, report.patient_history_removed, report.conversation_removed
        );
        report
    }
}
