use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, StudentResponse, TokenResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Stable identity derived from the display name, so a returning
/// student finds their previous attempts without an account.
pub(crate) fn derive_student_id(name: &str) -> String {
    let slug = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".");
    format!("{slug}@exam.local")
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let code = payload.access_code.trim();
    let auth = state.settings().auth();

    let accepted = if auth.fallback_enabled && code == auth.fallback_code {
        tracing::warn!("Login accepted via fallback access code");
        true
    } else {
        repositories::access_codes::find_active(state.db(), code)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check access code"))?
            .is_some()
    };

    if !accepted {
        return Err(ApiError::Unauthorized("Invalid access code"));
    }

    let name = payload.name.trim().to_string();
    let student_id = derive_student_id(&name);

    state.sessions().login(&student_id).await;

    let token = security::create_access_token(&student_id, &name, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(student_id = %student_id, "Student logged in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        student: StudentResponse { student_id, name },
    }))
}

async fn logout(
    State(state): State<AppState>,
    student: CurrentStudent,
) -> Result<StatusCode, ApiError> {
    state.sessions().logout(&student.student_id).await;
    tracing::info!(student_id = %student.student_id, "Student logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(student: CurrentStudent) -> Json<StudentResponse> {
    Json(StudentResponse { student_id: student.student_id, name: student.name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_dotted_lowercase_identity() {
        assert_eq!(derive_student_id("Marie Curie"), "marie.curie@exam.local");
        assert_eq!(derive_student_id("  Jean  Paul  Sartre "), "jean.paul.sartre@exam.local");
        assert_eq!(derive_student_id("AMINA"), "amina@exam.local");
    }

    #[test]
    fn derivation_is_stable_across_case_and_spacing() {
        assert_eq!(derive_student_id("Marie  CURIE"), derive_student_id("marie curie"));
    }
}
