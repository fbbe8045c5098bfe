use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_offset;
use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;
use crate::exam::answers::AnswerMap;
use crate::exam::normalizer::ExamContent;
use crate::exam::session::Phase;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateExamRequest {
    #[validate(length(min = 1, message = "track must not be empty"))]
    pub(crate) track: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummary {
    pub(crate) id: String,
    pub(crate) track: String,
    pub(crate) status: AttemptStatus,
    pub(crate) created_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) has_correction: bool,
}

impl AttemptSummary {
    pub(crate) fn from_db(attempt: &ExamAttempt, has_correction: bool) -> Self {
        Self {
            id: attempt.id.clone(),
            track: attempt.track.clone(),
            status: attempt.status,
            created_at: format_offset(attempt.created_at),
            submitted_at: attempt.submitted_at.map(format_offset),
            has_correction,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetail {
    pub(crate) id: String,
    pub(crate) track: String,
    pub(crate) status: AttemptStatus,
    pub(crate) duration_minutes: i32,
    pub(crate) content: Option<ExamContent>,
    pub(crate) responses: AnswerMap,
    pub(crate) has_correction: bool,
    pub(crate) phase: Phase,
    pub(crate) created_at: String,
    pub(crate) submitted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveAnswersRequest {
    pub(crate) answers: AnswerMap,
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveAnswersResponse {
    pub(crate) accepted: usize,
    /// False when the durable flush failed; the in-session copy is
    /// still current and is flushed again at submission.
    pub(crate) persisted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) phase: Phase,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) phase: Phase,
    pub(crate) exam_id: Option<String>,
}
