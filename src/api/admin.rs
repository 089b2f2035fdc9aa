//! Administrative endpoints
//!
//! Thin wrappers over the manager's admin operations. Every operation is
//! validated before anything is mutated; a bad target yields 400.
//!
//! The reset endpoints treat an empty body as "all services". A body that is
//! present but does not parse is rejected, never widened to "all".

use axum::{body::Bytes, extract::State, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetErrorsRequest {
    /// All services when absent
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetCooldownsRequest {
    #[serde(default)]
    pub service: Option<String>,
    /// Only meaningful together with `service`
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialTarget {
    pub service: String,
    pub index: usize,
}

/// Optional service scope for a health sweep
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepRequest {
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub ok: bool,
    pub message: String,
}

impl AdminResponse {
    fn done(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: true,
            message: message.into(),
        })
    }
}

/// Parse an optional JSON body; only an empty body falls back to the default
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid request body: {}", e)))
}

/// POST /admin/errors/reset
pub async fn reset_errors(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AdminResponse>, ApiError> {
    let req: ResetErrorsRequest = optional_body(&body)?;
    state.manager.reset_errors(req.service.as_deref())?;
    Ok(AdminResponse::done(match req.service {
        Some(service) => format!("Error counters reset for {}", service),
        None => "Error counters reset for all services".to_string(),
    }))
}

/// POST /admin/cooldowns/reset
pub async fn reset_cooldowns(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AdminResponse>, ApiError> {
    let req: ResetCooldownsRequest = optional_body(&body)?;
    match (req.service, req.index) {
        (Some(service), index) => {
            state.manager.reset_cooldowns(&service, index)?;
            Ok(AdminResponse::done(match index {
                Some(index) => format!("Cooldown reset for {}[{}]", service, index),
                None => format!("Cooldowns reset for {}", service),
            }))
        }
        (None, Some(_)) => Err(ApiError::InvalidRequest(
            "'index' requires 'service'".to_string(),
        )),
        (None, None) => {
            state.manager.reset_all_cooldowns();
            Ok(AdminResponse::done("All cooldowns reset"))
        }
    }
}

/// POST /admin/health/sweep
pub async fn sweep(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AdminResponse>, ApiError> {
    let req: SweepRequest = optional_body(&body)?;
    let transitions = state.manager.sweep(req.service.as_deref())?;
    Ok(AdminResponse::done(format!(
        "Health sweep applied {} transition(s) in {}",
        transitions,
        req.service.as_deref().unwrap_or("all services")
    )))
}

/// POST /admin/credentials/offline
pub async fn set_offline(
    State(state): State<AppState>,
    Json(target): Json<CredentialTarget>,
) -> Result<Json<AdminResponse>, ApiError> {
    state.manager.set_offline(&target.service, target.index)?;
    Ok(AdminResponse::done(format!(
        "{}[{}] taken offline",
        target.service, target.index
    )))
}

/// POST /admin/credentials/online
pub async fn set_online(
    State(state): State<AppState>,
    Json(target): Json<CredentialTarget>,
) -> Result<Json<AdminResponse>, ApiError> {
    state.manager.set_online(&target.service, target.index)?;
    Ok(AdminResponse::done(format!(
        "{}[{}] back online",
        target.service, target.index
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_means_all() {
        let req: ResetCooldownsRequest = optional_body(&Bytes::new()).unwrap();
        assert!(req.service.is_none());
        let req: ResetErrorsRequest = optional_body(&Bytes::from_static(b" \n")).unwrap();
        assert!(req.service.is_none());
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let wrong_type = Bytes::from_static(br#"{"service":"gemini","index":"0"}"#);
        assert!(optional_body::<ResetCooldownsRequest>(&wrong_type).is_err());

        let typo = Bytes::from_static(br#"{"servce":"gemini"}"#);
        assert!(optional_body::<ResetErrorsRequest>(&typo).is_err());

        let truncated = Bytes::from_static(br#"{"service":"#);
        assert!(optional_body::<SweepRequest>(&truncated).is_err());
    }

    #[test]
    fn test_scoped_body_parses() {
        let body = Bytes::from_static(br#"{"service":"gemini","index":0}"#);
        let req: ResetCooldownsRequest = optional_body(&body).unwrap();
        assert_eq!(req.service.as_deref(), Some("gemini"));
        assert_eq!(req.index, Some(0));
    }
}
