//! Admin authentication middleware
//!
//! When `ADMIN_API_KEY` is configured, `/admin/*` requires it either as
//! `x-api-key` or as `Authorization: Bearer <key>`.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::ApiError;
use crate::utils::key_preview;

/// Authentication state required by the middleware
#[derive(Clone)]
pub struct AuthState {
    pub settings: Arc<Settings>,
}

impl AuthState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

/// Reject admin requests that do not carry the configured key
pub async fn require_admin_key(
    State(auth_state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = auth_state.settings.admin_api_key.as_deref() else {
        tracing::debug!("Admin key not configured, skipping authentication");
        return Ok(next.run(request).await);
    };

    let Some(provided) = extract_api_key(&request) else {
        tracing::warn!(path = %request.uri().path(), "Admin request missing API key");
        return Err(ApiError::Unauthorized(
            "Missing API key. Include 'x-api-key' or 'Authorization: Bearer <key>' header in your request."
                .to_string(),
        ));
    };

    if provided != expected {
        tracing::warn!(key = %key_preview(&provided), "Invalid admin API key");
        return Err(ApiError::Unauthorized("Invalid API key.".to_string()));
    }

    Ok(next.run(request).await)
}

/// Extract API key from request headers
///
/// Supports both `x-api-key` and `Authorization: Bearer`.
pub fn extract_api_key<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_api_key_from_either_header() {
        let request = Request::builder()
            .header("x-api-key", "admin-secret")
            .body(())
            .unwrap();
        assert_eq!(extract_api_key(&request).as_deref(), Some("admin-secret"));

        let request = Request::builder()
            .header("authorization", "Bearer admin-secret")
            .body(())
            .unwrap();
        assert_eq!(extract_api_key(&request).as_deref(), Some("admin-secret"));

        let request = Request::builder()
            .header("authorization", "Basic abc")
            .body(())
            .unwrap();
        assert!(extract_api_key(&request).is_none());
    }
}
