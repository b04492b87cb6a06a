use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::handlers::ErrorResponse;
use crate::AppState;

/// Extractor guarding operator actions such as reloads.
///
/// Add `_admin: AdminToken` to a handler's parameters to require the
/// configured bearer token. With no token configured every request passes.
pub struct AdminToken;

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminToken {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_token.as_str();
        if expected.is_empty() {
            return Ok(AdminToken);
        }

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
            return Err(AuthError::InvalidToken);
        }

        Ok(AdminToken)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing admin token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid admin token"),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
