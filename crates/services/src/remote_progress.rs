use async_trait::async_trait;
use guide_core::model::{AssessmentId, ModuleId, ProgressState, SectionId};
use serde::Serialize;
use serde_json::Value;
use storage::repository::{AdapterError, ProgressRepository};
use tracing::debug;

use crate::api_client::ApiClient;
use crate::error::ApiError;

const PROGRESS_PATH: &str = "/api/progress";
const SECTION_PATH: &str = "/api/progress/section";
const ASSESSMENT_PATH: &str = "/api/progress/assessment";

/// Progress adapter backed by the REST API. The client must carry the user's
/// bearer token.
#[derive(Clone, Debug)]
pub struct RemoteProgressRepository {
    client: ApiClient,
}

impl RemoteProgressRepository {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Serialize)]
struct SectionToggleRequest<'a> {
    section_id: &'a SectionId,
    module_id: &'a ModuleId,
    completed: bool,
}

#[derive(Debug, Serialize)]
struct AssessmentRequest<'a> {
    assessment_id: &'a AssessmentId,
    answers: &'a Value,
    score: f64,
}

impl From<ApiError> for AdapterError {
    fn from(err: ApiError) -> Self {
        if err.is_timeout() {
            return AdapterError::Timeout;
        }
        match err {
            ApiError::HttpStatus { status, detail } => AdapterError::Status {
                status: status.as_u16(),
                detail,
            },
            ApiError::Decode(err) => AdapterError::Corrupt(err.to_string()),
            other => AdapterError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl ProgressRepository for RemoteProgressRepository {
    async fn fetch_snapshot(&self) -> Result<ProgressState, AdapterError> {
        let body: Value = self.client.get_json(PROGRESS_PATH).await?;
        ProgressState::from_snapshot(body).map_err(|err| AdapterError::Corrupt(err.to_string()))
    }

    async fn write_section_toggle(
        &self,
        section_id: &SectionId,
        module_id: &ModuleId,
        completed: bool,
    ) -> Result<(), AdapterError> {
        let body = SectionToggleRequest {
            section_id,
            module_id,
            completed,
        };
        let ack: Value = self.client.post_json(SECTION_PATH, &body).await?;
        debug!(%section_id, %module_id, completed, ?ack, "section toggle acknowledged");
        Ok(())
    }

    async fn write_assessment(
        &self,
        assessment_id: &AssessmentId,
        answers: &Value,
        score: f64,
    ) -> Result<(), AdapterError> {
        let body = AssessmentRequest {
            assessment_id,
            answers,
            score,
        };
        let ack: Value = self.client.post_json(ASSESSMENT_PATH, &body).await?;
        debug!(%assessment_id, score, ?ack, "assessment acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_request_uses_wire_field_names() {
        let section = SectionId::new("intro").unwrap();
        let module = ModuleId::new("pm-basics").unwrap();
        let body = serde_json::to_value(SectionToggleRequest {
            section_id: &section,
            module_id: &module,
            completed: true,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"section_id": "intro", "module_id": "pm-basics", "completed": true})
        );
    }

    #[test]
    fn status_errors_keep_code_and_detail() {
        let err = ApiError::HttpStatus {
            status: reqwest::StatusCode::UNAUTHORIZED,
            detail: Some("Invalid token".into()),
        };
        match AdapterError::from(err) {
            AdapterError::Status { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail.as_deref(), Some("Invalid token"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_errors_map_to_corrupt() {
        let decode =
            serde_json::from_str::<ProgressState>(r#"{"completed_sections": 5}"#).unwrap_err();
        assert!(matches!(
            AdapterError::from(ApiError::Decode(decode)),
            AdapterError::Corrupt(_)
        ));
    }
}
