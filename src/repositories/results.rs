use sqlx::PgPool;

use crate::db::models::CorrectionResultRow;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, score_total, max_score, feedback_general, \
    detailed_correction, student_responses, created_at";

/// The worker may write several rows for one attempt; the newest wins.
pub(crate) async fn latest_for_attempt(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<CorrectionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, CorrectionResultRow>(&format!(
        "SELECT {COLUMNS} FROM correction_results \
         WHERE exam_id = $1 AND student_id = $2 \
         ORDER BY created_at DESC \
         LIMIT 1"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Newest row strictly after `since`. Used by the correction wait so a
/// re-submission never picks up the previous run's result.
pub(crate) async fn latest_since(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
    since: Option<time::OffsetDateTime>,
) -> Result<Option<CorrectionResultRow>, sqlx::Error> {
    sqlx::query_as::<_, CorrectionResultRow>(&format!(
        "SELECT {COLUMNS} FROM correction_results \
         WHERE exam_id = $1 AND student_id = $2 \
           AND ($3::timestamptz IS NULL OR created_at > $3) \
         ORDER BY created_at DESC \
         LIMIT 1"
    ))
    .bind(exam_id)
    .bind(student_id)
    .bind(since)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn exists_for_attempt(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM correction_results WHERE exam_id = $1 AND student_id = $2 LIMIT 1",
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
