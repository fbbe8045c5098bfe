use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::db::models::ExamAttempt;
use crate::db::types::AttemptStatus;
use crate::exam::answers::AnswerMap;

pub(crate) const COLUMNS: &str = "\
    id, student_id, student_name, track, status, duration_minutes, \
    content, responses, created_at, updated_at, submitted_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) student_name: &'a str,
    pub(crate) track: &'a str,
    pub(crate) duration_minutes: i32,
    pub(crate) content: Option<Value>,
    pub(crate) created_at: OffsetDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAttempt<'_>,
) -> Result<ExamAttempt, sqlx::Error> {
    let status = if params.content.is_some() {
        AttemptStatus::Ready
    } else {
        AttemptStatus::Generating
    };

    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts \
             (id, student_id, student_name, track, status, duration_minutes, \
              content, responses, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, '{{}}'::jsonb, $8, $8) \
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.student_name)
    .bind(params.track)
    .bind(status)
    .bind(params.duration_minutes)
    .bind(params.content.map(Json))
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!("SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    id: &str,
    student_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1 AND student_id = $2"
    ))
    .bind(id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Most recent first; the browsing screen lists these.
pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts \
         WHERE student_id = $1 \
         ORDER BY created_at DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn mark_ready(
    pool: &PgPool,
    id: &str,
    content: &Value,
    now: OffsetDateTime,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "UPDATE exam_attempts \
         SET status = $2, content = $3, updated_at = $4 \
         WHERE id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(AttemptStatus::Ready)
    .bind(Json(content))
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    now: OffsetDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exam_attempts SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(AttemptStatus::Failed)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Whole-map replacement. Concurrent flushes race benignly: the last
/// writer wins and the submission flush repeats the full map anyway.
pub(crate) async fn save_responses(
    pool: &PgPool,
    id: &str,
    student_id: &str,
    responses: &AnswerMap,
    now: OffsetDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts SET responses = $3, updated_at = $4 \
         WHERE id = $1 AND student_id = $2",
    )
    .bind(id)
    .bind(student_id)
    .bind(Json(responses))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// First submission moves the row to `submitted`, any later one to
/// `resubmitted`. `submitted_at` always advances to the database clock:
/// the correction wait uses it as a watermark, and a stale value would
/// let a resubmission rendezvous with the previous run's result. The
/// status CASE reads the pre-update `submitted_at`.
pub(crate) async fn mark_submitted(
    pool: &PgPool,
    id: &str,
    student_id: &str,
    responses: &AnswerMap,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "UPDATE exam_attempts \
         SET status = CASE WHEN submitted_at IS NULL THEN $3::attemptstatus \
                           ELSE $4::attemptstatus END, \
             responses = $5, \
             submitted_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 AND student_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(student_id)
    .bind(AttemptStatus::Submitted)
    .bind(AttemptStatus::Resubmitted)
    .bind(Json(responses))
    .fetch_optional(pool)
    .await
}
