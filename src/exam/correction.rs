//! Correction result produced by the external grading worker.
//!
//! Rows are written exclusively by the worker and treated as immutable;
//! a re-correction adds a new row and the most recent matching row wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::exam::answers::AnswerMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CorrectionStatus {
    Correct,
    Partial,
    Incorrect,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CorrectionItem {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) status: CorrectionStatus,
    #[serde(default)]
    pub(crate) points_earned: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) points_reserved: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) student_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CorrectionReport {
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) score_total: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) feedback_general: Option<String>,
    pub(crate) detailed_correction: Vec<CorrectionItem>,
    pub(crate) student_responses: Option<AnswerMap>,
}

/// Decode the per-question item list. The worker sometimes writes the
/// list string-encoded inside the JSON column, so both shapes decode.
pub(crate) fn decode_items(value: &Value) -> Vec<CorrectionItem> {
    let parsed;
    let list = match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner) => {
                parsed = inner;
                &parsed
            }
            Err(_) => return Vec::new(),
        },
        other => other,
    };

    match list {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_plain_array() {
        let items = decode_items(&json!([
            {"id": "comp_1_0", "status": "correct", "points_earned": 5.0}
        ]));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, CorrectionStatus::Correct);
        assert_eq!(items[0].points_earned, 5.0);
    }

    #[test]
    fn decodes_string_encoded_array() {
        let encoded = json!([{"id": "writing_1", "status": "partial", "points_earned": 13.0}]);
        let items = decode_items(&Value::String(encoded.to_string()));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "writing_1");
    }

    #[test]
    fn unknown_status_defaults() {
        let items = decode_items(&json!([{"id": "comp_1_0", "status": "pending"}]));
        assert_eq!(items[0].status, CorrectionStatus::Unknown);
        assert_eq!(items[0].points_earned, 0.0);
    }

    #[test]
    fn garbage_decodes_to_empty() {
        assert!(decode_items(&Value::String("not json".to_string())).is_empty());
        assert!(decode_items(&json!({"oops": true})).is_empty());
    }
}
