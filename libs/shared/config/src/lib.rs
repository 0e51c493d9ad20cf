use std::env;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_STORAGE_NAMESPACE: &str = "hospital_chat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host serving the hospital-scoped (`/h/{slug}`, `/v2/h/{slug}`) routes.
    pub api_base_url: String,
    /// Fixed host still serving the recommendation and reschedule routes.
    pub legacy_api_base_url: String,
    pub hospital_slug: String,
    pub storage_namespace: String,
    pub session_store_path: Option<String>,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_base_url = env::var("HOSPITAL_API_BASE_URL")
            .unwrap_or_else(|_| {
                warn!("HOSPITAL_API_BASE_URL not set, using default");
                DEFAULT_API_BASE_URL.to_string()
            });

        let config = Self {
            legacy_api_base_url: env::var("LEGACY_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("LEGACY_API_BASE_URL not set, falling back to HOSPITAL_API_BASE_URL");
                    api_base_url.clone()
                }),
            api_base_url,
            hospital_slug: env::var("HOSPITAL_SLUG")
                .unwrap_or_else(|_| {
                    warn!("HOSPITAL_SLUG not set, using empty value");
                    String::new()
                }),
            storage_namespace: env::var("SESSION_STORAGE_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_STORAGE_NAMESPACE.to_string()),
            session_store_path: env::var("SESSION_STORE_PATH").ok(),
            request_timeout_secs: env::var("API_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| match raw.parse() {
                    Ok(secs) => Some(secs),
                    Err(_) => {
                        warn!("API_TIMEOUT_SECS is not a number ({}), using default", raw);
                        None
                    }
                })
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Config pointing both hosts at one base URL, as used by tests and local runs.
    pub fn for_base_url(base_url: &str, hospital_slug: &str) -> Self {
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            legacy_api_base_url: base_url.trim_end_matches('/').to_string(),
            hospital_slug: hospital_slug.to_string(),
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            session_store_path: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty()
            && !self.legacy_api_base_url.is_empty()
            && !self.hospital_slug.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
