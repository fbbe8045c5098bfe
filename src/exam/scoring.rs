//! Result presenter: derived, read-only computation over a final
//! correction report.
//!
//! Stored totals are authoritative. The per-section maximum is a
//! display heuristic reconstructed from item statuses; it does not
//! reconcile with the stored total and is never treated as ground
//! truth.

use crate::exam::answers::AnswerMap;
use crate::exam::correction::{CorrectionItem, CorrectionReport, CorrectionStatus};
use crate::exam::keys::{self, Section};

/// Fallback denominator when the worker wrote no max score.
pub(crate) const DEFAULT_MAX_SCORE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub(crate) struct ScoreSummary {
    pub(crate) score_total: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    /// Whether the totals came from the stored row rather than the
    /// itemized fallback.
    pub(crate) from_stored_totals: bool,
}

/// Aggregate totals. Stored values win verbatim even when they do not
/// match the itemized sum; summing `points_earned` is only a fallback
/// for rows where the worker wrote no total.
pub(crate) fn summarize(report: &CorrectionReport) -> ScoreSummary {
    let from_stored_totals = report.score_total.is_some();
    let score_total = report.score_total.unwrap_or_else(|| {
        report.detailed_correction.iter().map(|item| item.points_earned).sum()
    });
    let max_score = report.max_score.unwrap_or(DEFAULT_MAX_SCORE);
    let percentage = if max_score > 0.0 { score_total / max_score * 100.0 } else { 0.0 };

    ScoreSummary { score_total, max_score, percentage, from_stored_totals }
}

/// Display-only conversion to the conventional out-of-20 scale.
pub(crate) fn on_scale_of_twenty(summary: &ScoreSummary) -> f64 {
    if summary.max_score > 0.0 {
        summary.score_total / summary.max_score * 20.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SectionBucket {
    Reading,
    Language,
    Writing,
    Other,
}

impl SectionBucket {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Reading => "Reading",
            Self::Language => "Language",
            Self::Writing => "Writing",
            Self::Other => "Other",
        }
    }
}

pub(crate) fn bucket_of(question_key: &str) -> SectionBucket {
    match Section::of(question_key) {
        Some(Section::Comprehension) => SectionBucket::Reading,
        Some(Section::Language) | Some(Section::LanguageFree) => SectionBucket::Language,
        Some(Section::Writing) => SectionBucket::Writing,
        None => SectionBucket::Other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SectionBreakdown {
    pub(crate) bucket: SectionBucket,
    pub(crate) items: Vec<CorrectionItem>,
    pub(crate) points_earned: f64,
    /// Approximate per-section maximum reconstructed from item
    /// statuses; a display aid only.
    pub(crate) approx_max: f64,
}

/// Partition items by section prefix. Unrecognized keys land in the
/// `Other` bucket rather than being dropped. Empty buckets are omitted.
pub(crate) fn group_by_section(items: &[CorrectionItem]) -> Vec<SectionBreakdown> {
    let order = [
        SectionBucket::Reading,
        SectionBucket::Language,
        SectionBucket::Writing,
        SectionBucket::Other,
    ];

    order
        .into_iter()
        .filter_map(|bucket| {
            let members: Vec<CorrectionItem> = items
                .iter()
                .filter(|item| bucket_of(&item.id) == bucket)
                .cloned()
                .collect();
            if members.is_empty() {
                return None;
            }

            let points_earned = members.iter().map(|item| item.points_earned).sum();
            let approx_max =
                members.iter().map(|item| approx_item_max(item, bucket)).sum();

            Some(SectionBreakdown { bucket, items: members, points_earned, approx_max })
        })
        .collect()
}

/// Heuristic maximum contribution of one item: its earned points plus a
/// status-dependent margin (writing items use a wider partial margin).
fn approx_item_max(item: &CorrectionItem, bucket: SectionBucket) -> f64 {
    match item.status {
        CorrectionStatus::Correct => item.points_earned + 1.0,
        CorrectionStatus::Partial => {
            let margin = if bucket == SectionBucket::Writing { 2.0 } else { 0.5 };
            item.points_earned + margin
        }
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub(crate) struct StatusTally {
    pub(crate) correct: usize,
    pub(crate) partial: usize,
    pub(crate) incorrect: usize,
}

pub(crate) fn tally(items: &[CorrectionItem]) -> StatusTally {
    let mut out = StatusTally::default();
    for item in items {
        match item.status {
            CorrectionStatus::Correct => out.correct += 1,
            CorrectionStatus::Partial => out.partial += 1,
            CorrectionStatus::Incorrect => out.incorrect += 1,
            CorrectionStatus::Unknown => {}
        }
    }
    out
}

/// Resolve the student's answer for an item: the item's own copy first,
/// then the result row's responses, then the attempt's stored
/// responses. Matching keys fall back to their legacy form.
pub(crate) fn resolve_student_answer(
    item: &CorrectionItem,
    result_responses: Option<&AnswerMap>,
    attempt_responses: Option<&AnswerMap>,
) -> Option<String> {
    if let Some(answer) = &item.student_answer {
        if !answer.is_empty() {
            return Some(answer.clone());
        }
    }

    for source in [result_responses, attempt_responses].into_iter().flatten() {
        if let Some(answer) = lookup_with_legacy(source, &item.id) {
            return Some(answer);
        }
    }

    None
}

fn lookup_with_legacy(map: &AnswerMap, key: &str) -> Option<String> {
    if let Some(answer) = map.get(key) {
        return Some(answer.clone());
    }
    let exercise_id =
        key.strip_prefix(keys::LANG_PREFIX).and_then(|rest| rest.strip_suffix("_0"))?;
    map.get(&format!("{}{exercise_id}", keys::LEGACY_MATCHING_PREFIX)).cloned()
}
