use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

/// `{prefix}_{unix_millis}_{9 random alphanumerics}`; sortable by creation time
/// to the millisecond, unique within it with overwhelming probability.
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), random_suffix())
}

/// Client-side stand-in for a server-assigned numeric id.
pub fn generate_numeric_id() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh id for a diagnostic session; the server may replace it with its own.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
