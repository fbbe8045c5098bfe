use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::{format_offset, now_utc};
use crate::db::models::ExamAttempt;
use crate::exam::answers::{self, AnswerMap};
use crate::exam::normalizer::{self, ExamContent};
use crate::exam::session::{Event, Phase, SessionError};
use crate::repositories::{attempts, results};
use crate::schemas::attempt::{
    AttemptDetail, AttemptSummary, GenerateExamRequest, SaveAnswersRequest, SaveAnswersResponse,
    SessionView, SubmitResponse,
};
use crate::schemas::result::ResultResponse;
use crate::services::generation::{GenerateExamRequest as GenerationPayload, GenerationService};
use crate::services::rendezvous::{CorrectionRendezvous, PgResultStore};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attempts).post(generate_exam))
        .route("/session", get(session_view))
        .route("/session/return", post(return_to_browsing))
        .route("/:exam_id", get(open_attempt))
        .route("/:exam_id/answers", put(save_answers))
        .route("/:exam_id/submit", post(submit_attempt))
        .route("/:exam_id/correction/wait", get(wait_for_correction))
        .route("/:exam_id/correction/cancel", post(cancel_correction))
        .route("/:exam_id/result", get(get_result))
        .route("/:exam_id/revise", post(revise_attempt))
}

async fn list_attempts(
    State(state): State<AppState>,
    student: CurrentStudent,
) -> Result<Json<Vec<AttemptSummary>>, ApiError> {
    let rows = attempts::list_by_student(state.db(), &student.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let has_correction = results::exists_for_attempt(state.db(), &row.id, &student.student_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check corrections"))?;
        summaries.push(AttemptSummary::from_db(row, has_correction));
    }

    Ok(Json(summaries))
}

async fn generate_exam(
    State(state): State<AppState>,
    student: CurrentStudent,
    Json(payload): Json<GenerateExamRequest>,
) -> Result<(StatusCode, Json<AttemptDetail>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let track = payload.track.trim().to_string();
    if !state.settings().exam().tracks.contains(&track) {
        return Err(ApiError::BadRequest(format!("Unknown track: {track}")));
    }

    state
        .sessions()
        .with_session(&student.student_id, |session| session.begin_generation(&track))
        .await?;

    let exam_id = Uuid::new_v4().to_string();
    let duration_minutes = state.settings().exam().duration_minutes;

    let created = attempts::create(
        state.db(),
        attempts::CreateAttempt {
            id: &exam_id,
            student_id: &student.student_id,
            student_name: &student.name,
            track: &track,
            duration_minutes: duration_minutes as i32,
            content: None,
            created_at: now_utc(),
        },
    )
    .await;

    if let Err(err) = created {
        fail_generation(&state, &student.student_id, &exam_id).await;
        return Err(ApiError::internal(err, "Failed to create exam attempt"));
    }

    let service = GenerationService::from_settings(state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to build generation client"))?;

    let raw = match service
        .request_exam(GenerationPayload {
            exam_id: &exam_id,
            student_id: &student.student_id,
            student_name: &student.name,
            track: &track,
            duration_minutes,
        })
        .await
    {
        Ok(Some(value)) => value,
        Ok(None) => match service.await_ready(state.db(), &exam_id).await {
            Ok(value) => value,
            Err(err) => {
                fail_generation(&state, &student.student_id, &exam_id).await;
                return Err(err.into());
            }
        },
        Err(err) => {
            fail_generation(&state, &student.student_id, &exam_id).await;
            return Err(err.into());
        }
    };

    let content = match normalizer::normalize(&raw) {
        Ok(content) => content,
        Err(err) => {
            let raw_excerpt = err
                .raw_payload()
                .map(|raw| crate::services::generation::truncate_detail(&raw))
                .unwrap_or_else(|| crate::services::generation::truncate_detail(&raw.to_string()));
            tracing::error!(
                exam_id = %exam_id,
                error = %err,
                raw = %raw_excerpt,
                "Generated exam failed normalization"
            );
            fail_generation(&state, &student.student_id, &exam_id).await;
            return Err(ApiError::BadGateway(format!("Generated exam is malformed: {err}")));
        }
    };

    let canonical = serde_json::to_value(&content)
        .map_err(|e| ApiError::internal(e, "Failed to serialize exam content"))?;
    let row = attempts::mark_ready(state.db(), &exam_id, &canonical, now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store generated exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam attempt disappeared".to_string()))?;

    let phase = state
        .sessions()
        .with_session(&student.student_id, |session| {
            session.generation_succeeded(&exam_id)?;
            Ok(session.phase)
        })
        .await?;

    tracing::info!(exam_id = %exam_id, track = %row.track, "Exam generated");
    metrics::counter!("exams_generated_total").increment(1);

    Ok((StatusCode::CREATED, Json(detail(row, Some(content), AnswerMap::new(), false, phase))))
}

async fn open_attempt(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<AttemptDetail>, ApiError> {
    let row = find_owned(&state, &exam_id, &student.student_id).await?;

    let Some(content_json) = row.content.as_ref() else {
        return Err(ApiError::Conflict("Exam is not ready yet".to_string()));
    };

    let content = normalize_stored(&exam_id, &content_json.0)?;
    let responses = answers::migrate_map(&row.responses.0);
    let has_correction = results::exists_for_attempt(state.db(), &row.id, &student.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check corrections"))?;

    let phase = state
        .sessions()
        .with_session(&student.student_id, |session| {
            session.load_attempt(
                &row.id,
                &row.track,
                &responses,
                row.status.is_submitted(),
                has_correction,
            )?;
            Ok(session.phase)
        })
        .await?;

    Ok(Json(detail(row, Some(content), responses, has_correction, phase)))
}

async fn save_answers(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
    Json(payload): Json<SaveAnswersRequest>,
) -> Result<Json<SaveAnswersResponse>, ApiError> {
    let accepted = payload.answers.len();

    let merged = state
        .sessions()
        .with_session(&student.student_id, |session| {
            require_attempt(session.attempt_ref()?, &exam_id)?;
            for (key, value) in &payload.answers {
                session.set_answer(key, value)?;
            }
            Ok(session.answers.get_all())
        })
        .await?;

    // Durable flush is best effort here; the submit path repeats it.
    let persisted =
        match attempts::save_responses(state.db(), &exam_id, &student.student_id, &merged, now_utc())
            .await
        {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(exam_id = %exam_id, error = %err, "Answer flush failed");
                false
            }
        };

    Ok(Json(SaveAnswersResponse { accepted, persisted }))
}

async fn submit_attempt(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let answers = state
        .sessions()
        .with_session(&student.student_id, |session| {
            require_attempt(session.attempt_ref()?, &exam_id)?;
            session.begin_submission()
        })
        .await?;

    let flushed = attempts::save_responses(
        state.db(),
        &exam_id,
        &student.student_id,
        &answers,
        now_utc(),
    )
    .await;
    if let Err(err) = flushed {
        abort_submission(&state, &student.student_id).await;
        return Err(ApiError::internal(err, "Failed to persist answers before submission"));
    }

    let service = crate::services::correction::CorrectionService::from_settings(state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to build correction client"))?;

    if let Err(err) = service.submit(&student.student_id, &exam_id, &answers).await {
        abort_submission(&state, &student.student_id).await;
        return Err(err.into());
    }

    let row = attempts::mark_submitted(state.db(), &exam_id, &student.student_id, &answers)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to mark attempt submitted"))?
        .ok_or_else(|| ApiError::NotFound("Exam attempt not found".to_string()))?;

    let phase = state
        .sessions()
        .with_session(&student.student_id, |session| {
            session.submission_dispatched()?;
            Ok(session.phase)
        })
        .await?;

    tracing::info!(exam_id = %exam_id, status = ?row.status, "Answers submitted for correction");
    metrics::counter!("submissions_total").increment(1);

    Ok(Json(SubmitResponse { exam_id: row.id, status: row.status, phase }))
}

/// Long poll: blocks until the correction worker writes a result row
/// newer than the submission, the budget runs out, or the session
/// moves on.
async fn wait_for_correction(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let row = find_owned(&state, &exam_id, &student.student_id).await?;

    let captured_revision = state
        .sessions()
        .with_session(&student.student_id, |session| {
            require_attempt(session.attempt_ref()?, &exam_id)?;
            if session.phase != Phase::AwaitingCorrection {
                return Err(SessionError::InvalidTransition {
                    from: session.phase,
                    event: Event::CorrectionArrived,
                });
            }
            Ok(session.revision)
        })
        .await?;

    let rendezvous = CorrectionRendezvous::from_settings(state.settings());
    let store = PgResultStore::new(state.db().clone());

    let report = match rendezvous
        .await_result(&store, &exam_id, &student.student_id, row.submitted_at)
        .await
    {
        Ok(report) => report,
        Err(err) => {
            if matches!(err, crate::services::rendezvous::RendezvousError::Timeout) {
                let _ = state
                    .sessions()
                    .with_session(&student.student_id, |session| session.correction_timed_out())
                    .await;
            }
            return Err(err.into());
        }
    };

    let applied = state
        .sessions()
        .with_session(&student.student_id, |session| {
            Ok(session.correction_arrived(&exam_id, captured_revision))
        })
        .await?;

    if !applied {
        return Err(ApiError::Conflict(
            "Correction was superseded by a newer action in this session".to_string(),
        ));
    }

    metrics::counter!("corrections_received_total").increment(1);

    let content = stored_content(&row);
    Ok(Json(ResultResponse::build(&report, Some(&row.responses.0), content.as_ref())))
}

async fn cancel_correction(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state
        .sessions()
        .with_session(&student.student_id, |session| {
            require_attempt(session.attempt_ref()?, &exam_id)?;
            session.cancel_correction()?;
            Ok(session_view_of(session))
        })
        .await?;

    Ok(Json(view))
}

async fn get_result(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let row = find_owned(&state, &exam_id, &student.student_id).await?;

    let result = results::latest_for_attempt(state.db(), &exam_id, &student.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load correction result"))?
        .ok_or_else(|| ApiError::NotFound("No correction for this exam yet".to_string()))?;

    let content = stored_content(&row);
    let report = result.into_report();

    Ok(Json(ResultResponse::build(&report, Some(&row.responses.0), content.as_ref())))
}

async fn revise_attempt(
    State(state): State<AppState>,
    student: CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let row = find_owned(&state, &exam_id, &student.student_id).await?;
    let saved = answers::migrate_map(&row.responses.0);

    let view = state
        .sessions()
        .with_session(&student.student_id, |session| {
            require_attempt(session.attempt_ref()?, &exam_id)?;
            session.revise(&saved)?;
            Ok(session_view_of(session))
        })
        .await?;

    Ok(Json(view))
}

async fn return_to_browsing(
    State(state): State<AppState>,
    student: CurrentStudent,
) -> Result<Json<SessionView>, ApiError> {
    let view = state
        .sessions()
        .with_session(&student.student_id, |session| {
            session.return_to_browsing()?;
            Ok(session_view_of(session))
        })
        .await?;

    Ok(Json(view))
}

async fn session_view(
    State(state): State<AppState>,
    student: CurrentStudent,
) -> Result<Json<SessionView>, ApiError> {
    let view = state
        .sessions()
        .with_session(&student.student_id, |session| Ok(session_view_of(session)))
        .await?;

    Ok(Json(view))
}

fn session_view_of(session: &crate::exam::session::Session) -> SessionView {
    SessionView {
        phase: session.phase,
        exam_id: session.attempt.as_ref().map(|attempt| attempt.exam_id.clone()),
    }
}

fn require_attempt(
    attempt: &crate::exam::session::AttemptRef,
    exam_id: &str,
) -> Result<(), SessionError> {
    if attempt.exam_id == exam_id {
        Ok(())
    } else {
        Err(SessionError::NoAttempt)
    }
}

async fn find_owned(
    state: &AppState,
    exam_id: &str,
    student_id: &str,
) -> Result<ExamAttempt, ApiError> {
    attempts::find_for_student(state.db(), exam_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam attempt"))?
        .ok_or_else(|| ApiError::NotFound("Exam attempt not found".to_string()))
}

fn normalize_stored(exam_id: &str, raw: &Value) -> Result<ExamContent, ApiError> {
    normalizer::normalize(raw).map_err(|err| {
        tracing::error!(exam_id = %exam_id, error = %err, "Stored exam content failed to normalize");
        ApiError::Internal("Stored exam content is unreadable".to_string())
    })
}

/// Best-effort view of the stored content for result presentation.
fn stored_content(row: &ExamAttempt) -> Option<ExamContent> {
    row.content.as_ref().and_then(|json| normalizer::normalize(&json.0).ok())
}

async fn fail_generation(state: &AppState, student_id: &str, exam_id: &str) {
    if let Err(err) = attempts::mark_failed(state.db(), exam_id, now_utc()).await {
        tracing::warn!(exam_id = %exam_id, error = %err, "Failed to mark attempt failed");
    }
    let _ = state
        .sessions()
        .with_session(student_id, |session| session.generation_failed())
        .await;
}

async fn abort_submission(state: &AppState, student_id: &str) {
    let _ = state
        .sessions()
        .with_session(student_id, |session| session.submission_failed())
        .await;
}

fn detail(
    row: ExamAttempt,
    content: Option<ExamContent>,
    responses: AnswerMap,
    has_correction: bool,
    phase: Phase,
) -> AttemptDetail {
    AttemptDetail {
        id: row.id,
        track: row.track,
        status: row.status,
        duration_minutes: row.duration_minutes,
        content,
        responses,
        has_correction,
        phase,
        created_at: format_offset(row.created_at),
        submitted_at: row.submitted_at.map(format_offset),
    }
}
