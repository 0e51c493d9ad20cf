use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AppError {
    /// Builds an `Api` error from a non-success response body, preferring the
    /// `detail` (then `message`) field of a JSON body over the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                ["detail", "message", "error"]
                    .iter()
                    .find_map(|field| json.get(*field).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| body.to_string());

        tracing::error!("Error: {}: {}", status, message);

        AppError::Api { status, message }
    }

    /// The text suitable for showing to a patient, without the status prefix.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
