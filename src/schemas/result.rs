use serde::Serialize;

use crate::exam::answers::AnswerMap;
use crate::exam::correction::{CorrectionReport, CorrectionStatus};
use crate::exam::normalizer::ExamContent;
use crate::exam::scoring::{self, ScoreSummary, StatusTally};

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) exam_id: String,
    #[serde(flatten)]
    pub(crate) summary: ScoreSummary,
    pub(crate) on_twenty: f64,
    pub(crate) feedback_general: Option<String>,
    pub(crate) tally: StatusTally,
    pub(crate) sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionView {
    pub(crate) label: &'static str,
    pub(crate) points_earned: f64,
    pub(crate) approx_max: f64,
    pub(crate) items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ItemView {
    pub(crate) id: String,
    pub(crate) status: CorrectionStatus,
    pub(crate) points_earned: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) question: Option<String>,
}

impl ResultResponse {
    /// Assemble the review payload from a final report, the attempt's
    /// stored responses and the normalized exam content (for question
    /// texts).
    pub(crate) fn build(
        report: &CorrectionReport,
        attempt_responses: Option<&AnswerMap>,
        content: Option<&ExamContent>,
    ) -> Self {
        let summary = scoring::summarize(report);
        let on_twenty = scoring::on_scale_of_twenty(&summary);
        let tally = scoring::tally(&report.detailed_correction);

        let sections = scoring::group_by_section(&report.detailed_correction)
            .into_iter()
            .map(|section| SectionView {
                label: section.bucket.label(),
                points_earned: section.points_earned,
                approx_max: section.approx_max,
                items: section
                    .items
                    .iter()
                    .map(|item| ItemView {
                        id: item.id.clone(),
                        status: item.status,
                        points_earned: item.points_earned,
                        correct_answer: item.correct_answer.clone(),
                        explanation: item.explanation.clone(),
                        student_answer: scoring::resolve_student_answer(
                            item,
                            report.student_responses.as_ref(),
                            attempt_responses,
                        ),
                        question: content
                            .and_then(|content| content.question_text(&item.id))
                            .map(|(text, _)| text),
                    })
                    .collect(),
            })
            .collect();

        Self {
            exam_id: report.exam_id.clone(),
            summary,
            on_twenty,
            feedback_general: report.feedback_general.clone(),
            tally,
            sections,
        }
    }
}
