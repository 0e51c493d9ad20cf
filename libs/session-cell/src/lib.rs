pub mod models;
pub mod services;

pub use models::*;
pub use services::store::{SessionStore, StorageKeys, MAX_CONVERSATION_HISTORY, MAX_PATIENT_HISTORY};
pub use services::context::{CHRONIC_CONDITION_KEYWORDS, NEW_PATIENT_CONTEXT};
