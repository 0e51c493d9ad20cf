use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::HospitalApiClient;
use shared_models::AppError;

use crate::models::{AnswerQuestionResponse, DiagnosticQuestion, StartDiagnosticResponse};

pub struct DiagnosticService {
    api: HospitalApiClient,
}

impl DiagnosticService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: HospitalApiClient::new(config),
        }
    }

    /// Opens an adaptive diagnostic session. The server may answer with its
    /// own session id; when it omits one, `session_id` is kept.
    pub async fn start_session(
        &self,
        symptoms: &str,
        session_id: &str,
    ) -> Result<StartDiagnosticResponse, AppError> {
        debug!("Starting adaptive diagnostic session {}", session_id);

        let url = self.api.hospital_v2_url("/start-adaptive-diagnostic");
        let query = [
            ("symptoms", symptoms.to_string()),
            ("session_id", session_id.to_string()),
        ];

        let mut response: StartDiagnosticResponse = self.api.post(&url, &query, None).await?;

        if response.session_id.trim().is_empty() {
            response.session_id = session_id.to_string();
        }

        info!(
            "Diagnostic session {} started (question pending: {})",
            response.session_id,
            response.current_question.is_some()
        );

        Ok(response)
    }

    pub async fn answer_question(
        &self,
        session_id: &str,
        question: &DiagnosticQuestion,
        answer: &str,
    ) -> Result<AnswerQuestionResponse, AppError> {
        debug!("Answering question {} in session {}", question.id, session_id);

        let url = self.api.hospital_v2_url("/answer-adaptive-question");
        let query = [
            ("session_id", session_id.to_string()),
            ("question_id", question.id.clone()),
            ("answer_value", answer.to_string()),
            ("question_text", question.question.clone()),
            ("question_type", question.question_type.clone()),
            ("question_options", serde_json::to_string(&question.options)?),
        ];

        let response: AnswerQuestionResponse = self.api.post(&url, &query, None).await?;
        debug!("Session {} next step: {}", session_id, response.next_step.as_str());

        Ok(response)
    }
}
