use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 2, max = 120, message = "name must be between 2 and 120 characters"))]
    pub(crate) name: String,
    #[serde(alias = "accessCode")]
    #[validate(length(min = 1, message = "access code must not be empty"))]
    pub(crate) access_code: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) student_id: String,
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) student: StudentResponse,
}
