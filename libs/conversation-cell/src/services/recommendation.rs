use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::HospitalApiClient;
use shared_models::AppError;

use crate::models::{Doctor, TestRecommendation};

/// Pulls a list out of either a bare JSON array or an object wrapping it
/// under one of `keys`.
fn extract_list<T: DeserializeOwned>(body: Value, keys: &[&str]) -> Result<Vec<T>, AppError> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut fields) => keys
            .iter()
            .find_map(|key| fields.remove(*key).filter(Value::is_array))
            .unwrap_or_else(|| {
                warn!("Recommendation response had none of {:?}, treating as empty", keys);
                Value::Array(Vec::new())
            }),
        Value::Null => Value::Array(Vec::new()),
        other => return Err(AppError::Decode(format!("expected a list, got {}", other))),
    };

    Ok(serde_json::from_value(list)?)
}

pub struct RecommendationService {
    api: HospitalApiClient,
}

impl RecommendationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: HospitalApiClient::new(config),
        }
    }

    pub async fn recommend_tests(&self, symptoms: &str) -> Result<Vec<TestRecommendation>, AppError> {
        debug!("Fetching test recommendations");

        let url = self.api.legacy_url(&format!(
            "/tests/recommendations/{}",
            HospitalApiClient::encode_segment(symptoms)
        ));
        let body: Value = self.api.get(&url).await?;

        let tests: Vec<TestRecommendation> =
            extract_list(body, &["tests", "recommendations", "recommended_tests"])?;
        debug!("Received {} test recommendations", tests.len());
        Ok(tests)
    }

    pub async fn recommend_doctors(&self, symptoms: &str) -> Result<Vec<Doctor>, AppError> {
        debug!("Fetching doctor recommendations");

        let url = self.api.legacy_url("/recommend-doctors");
        let body: Value = self.api.post(&url, &[], Some(json!({ "symptoms": symptoms }))).await?;

        let doctors: Vec<Doctor> = extract_list(body, &["doctors", "recommended_doctors"])?;
        debug!("Received {} doctor recommendations", doctors.len());
        Ok(doctors)
    }
}
