use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::routes::quizzes::AppState;

pub const OWNER_NAME_HEADER: &str = "x-owner-name";

#[derive(Debug, Clone)]
pub struct OwnerAuth {
    pub owner_name: String,
}

impl FromRequestParts<AppState> for OwnerAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(OWNER_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(AuthError::MissingName)?;

        if !state.config.is_owner(name) {
            return Err(AuthError::NotOwner);
        }

        Ok(OwnerAuth {
            owner_name: name.to_string(),
        })
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingName,
    NotOwner,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingName => (
                StatusCode::UNAUTHORIZED,
                "missing_owner_name",
                "X-Owner-Name header is required",
            ),
            AuthError::NotOwner => (
                StatusCode::FORBIDDEN,
                "not_owner",
                "This name is not in the owner list",
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
