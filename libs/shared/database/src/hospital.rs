use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::AppError;

/// Transport to the hospital assistant API.
///
/// Routes live on two hosts: the hospital-scoped routes (`/h/{slug}/...`,
/// `/v2/h/{slug}/...`) on `api_base_url`, and the recommendation and
/// reschedule routes on `legacy_api_base_url`.
#[derive(Debug, Clone)]
pub struct HospitalApiClient {
    client: Client,
    base_url: String,
    legacy_base_url: String,
    hospital_slug: String,
}

impl HospitalApiClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            legacy_base_url: config.legacy_api_base_url.trim_end_matches('/').to_string(),
            hospital_slug: config.hospital_slug.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// `{base}/h/{slug}{path}`
    pub fn hospital_url(&self, path: &str) -> String {
        format!("{}/h/{}{}", self.base_url, self.hospital_slug, path)
    }

    /// `{base}/v2/h/{slug}{path}`
    pub fn hospital_v2_url(&self, path: &str) -> String {
        format!("{}/v2/h/{}{}", self.base_url, self.hospital_slug, path)
    }

    /// `{base}{path}` with no hospital scoping.
    pub fn base_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn legacy_url(&self, path: &str) -> String {
        format!("{}{}", self.legacy_base_url, path)
    }

    /// Percent-encodes one path segment.
    pub fn encode_segment(segment: &str) -> String {
        urlencoding::encode(segment).into_owned()
    }

    pub fn hospital_slug(&self) -> &str {
        &self.hospital_slug
    }

    pub async fn request<T>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, url).headers(self.get_headers());

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            AppError::Transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!("API error ({}) from {}: {}", status, url, text);
            return Err(AppError::from_response(status.as_u16(), &text));
        }

        // DELETE endpoints may answer with an empty body.
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };

        serde_json::from_str::<T>(payload).map_err(|e| {
            error!("Failed to decode response from {}: {}", url, e);
            AppError::Decode(e.to_string())
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        self.request(Method::GET, url, &[], None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, AppError> {
        self.request(Method::POST, url, query, body).await
    }

    pub async fn put<T: DeserializeOwned>(&self, url: &str, body: Value) -> Result<T, AppError> {
        self.request(Method::PUT, url, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        self.request(Method::DELETE, url, &[], None).await
    }
}
