use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::types::AttemptStatus;
use crate::exam::answers::AnswerMap;
use crate::exam::correction::{self, CorrectionReport};

/// One generated exam per row. `content` stays NULL while the external
/// generator is still working; `responses` holds the last flushed
/// answer map.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) track: String,
    pub(crate) status: AttemptStatus,
    pub(crate) duration_minutes: i32,
    pub(crate) content: Option<Json<Value>>,
    pub(crate) responses: Json<AnswerMap>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) submitted_at: Option<OffsetDateTime>,
}

/// Written by the correction worker; rows are append-only and the most
/// recent row for an (exam, student) pair wins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CorrectionResultRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) score_total: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) feedback_general: Option<String>,
    pub(crate) detailed_correction: Json<Value>,
    pub(crate) student_responses: Option<Json<AnswerMap>>,
    pub(crate) created_at: OffsetDateTime,
}

impl CorrectionResultRow {
    pub(crate) fn into_report(self) -> CorrectionReport {
        let detailed_correction = correction::decode_items(&self.detailed_correction.0);
        CorrectionReport {
            exam_id: self.exam_id,
            student_id: self.student_id,
            score_total: self.score_total,
            max_score: self.max_score,
            feedback_general: self.feedback_general,
            detailed_correction,
            student_responses: self.student_responses.map(|json| json.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AccessCode {
    pub(crate) code: String,
    pub(crate) label: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn report_decodes_string_encoded_items() {
        let row = CorrectionResultRow {
            id: "r-1".to_string(),
            exam_id: "exam-1".to_string(),
            student_id: "s".to_string(),
            score_total: Some(33.0),
            max_score: Some(40.0),
            feedback_general: None,
            detailed_correction: Json(Value::String(
                json!([{"id": "comp_1_0", "status": "correct", "points_earned": 5.0}]).to_string(),
            )),
            student_responses: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let report = row.into_report();
        assert_eq!(report.detailed_correction.len(), 1);
        assert_eq!(report.score_total, Some(33.0));
    }
}
