//! Bearer-token gate for the protected routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::api::response::ApiError;
use crate::AppState;

/// Admit the request only when a token is configured and the `Authorization`
/// header is exactly `Bearer <token>`.
///
/// A missing server token is a misconfiguration (500), not a client error.
pub fn verify_bearer(headers: &HeaderMap, expected_token: Option<&str>) -> Result<(), ApiError> {
    let token = expected_token.ok_or_else(|| ApiError::internal("API_TOKEN not configured"))?;

    let provided = headers
        .get(AUTHORIZATION)
        .map(|v| v.as_bytes())
        .ok_or_else(|| ApiError::unauthorized("Invalid or missing token"))?;

    let expected = format!("Bearer {token}");
    if bool::from(provided.ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid or missing token"))
    }
}

/// Middleware wrapping every protected route. Runs before any extractor, so a
/// rejected request never has its body read.
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    verify_bearer(request.headers(), state.config.api_token.as_deref())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn correct_token() {
        assert!(verify_bearer(&headers(Some("Bearer s3cret")), Some("s3cret")).is_ok());
    }

    #[test]
    fn missing_header() {
        let err = verify_bearer(&headers(None), Some("s3cret")).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrong_token() {
        let err = verify_bearer(&headers(Some("Bearer nope")), Some("s3cret")).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn comparison_is_exact() {
        for value in ["bearer s3cret", "Bearer s3cret ", "Bearer  s3cret", "s3cret", "Bearer s3cre"] {
            let err = verify_bearer(&headers(Some(value)), Some("s3cret")).unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "accepted {value:?}");
        }
    }

    #[test]
    fn unconfigured_token_is_server_error() {
        let err = verify_bearer(&headers(Some("Bearer anything")), None).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
