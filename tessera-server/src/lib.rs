//! HTTP API for the Tessera license server.
//!
//! A thin JSON layer over [`LicenseAuthority`]: it decodes requests, runs the
//! blocking store work on the blocking pool and maps [`LicenseError`] to a
//! status code plus an [`ErrorBody`]. Engines talk to it through
//! `tessera_license::RemoteValidator`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_authority::LicenseAuthority;
use tessera_license::{
    Activation, ActivationRequest, DeactivateRequest, ErrorBody, LicenseError, LicenseResult,
    ValidateRequest, ValidationReport,
};
use tessera_store::{ActivationLedger, LicenseStore};
use tessera_types::LicenseId;
use tracing::error;

/// Body of `GET /api/v1/health`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// A [`LicenseError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LicenseError);

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LicenseError::NotFound(_) => StatusCode::NOT_FOUND,
            LicenseError::Revoked
            | LicenseError::Expired(_)
            | LicenseError::HardwareMismatch(_) => StatusCode::FORBIDDEN,
            LicenseError::ActivationLimitReached { .. } => StatusCode::CONFLICT,
            LicenseError::InvalidSignature
            | LicenseError::MalformedToken(_)
            | LicenseError::InvalidTier(_)
            | LicenseError::InvalidRequest(_)
            | LicenseError::InvalidKey(_)
            | LicenseError::Serialization(_) => StatusCode::BAD_REQUEST,
            LicenseError::Storage(_) | LicenseError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_transient() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs a store-backed authority call on the blocking pool.
async fn blocking<S, T, F>(authority: Arc<LicenseAuthority<S>>, call: F) -> ApiResult<T>
where
    S: LicenseStore + ActivationLedger + 'static,
    T: Send + 'static,
    F: FnOnce(&LicenseAuthority<S>) -> LicenseResult<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || call(&authority))
        .await
        .map_err(|e| LicenseError::Storage(format!("worker task failed: {e}")))?;
    Ok(Json(result?))
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .map(String::from)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn activate_handler<S>(
    State(authority): State<Arc<LicenseAuthority<S>>>,
    headers: HeaderMap,
    Json(mut request): Json<ActivationRequest>,
) -> ApiResult<Activation>
where
    S: LicenseStore + ActivationLedger + 'static,
{
    // the address is observed, never taken from the client
    request.ip_address = client_ip(&headers).unwrap_or_default();
    blocking(authority, move |a| a.activate_license(&request)).await
}

async fn deactivate_handler<S>(
    State(authority): State<Arc<LicenseAuthority<S>>>,
    Json(request): Json<DeactivateRequest>,
) -> ApiResult<Option<Activation>>
where
    S: LicenseStore + ActivationLedger + 'static,
{
    blocking(authority, move |a| {
        a.deactivate_license(request.license_id, &request.hardware_id)
    })
    .await
}

async fn validate_handler<S>(
    State(authority): State<Arc<LicenseAuthority<S>>>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<ValidationReport>
where
    S: LicenseStore + ActivationLedger + 'static,
{
    blocking(authority, move |a| {
        a.validate_license(&request.license, &request.hardware_id)
    })
    .await
}

async fn activations_handler<S>(
    State(authority): State<Arc<LicenseAuthority<S>>>,
    Path(license_id): Path<String>,
) -> ApiResult<Vec<Activation>>
where
    S: LicenseStore + ActivationLedger + 'static,
{
    let license_id = LicenseId::parse(&license_id)
        .map_err(|e| LicenseError::InvalidRequest(format!("invalid license id: {e}")))?;
    blocking(authority, move |a| a.license_activations(license_id)).await
}

/// Build the HTTP API router over the given authority.
pub fn build_router<S>(authority: Arc<LicenseAuthority<S>>) -> Router
where
    S: LicenseStore + ActivationLedger + 'static,
{
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/activations", post(activate_handler::<S>))
        .route("/api/v1/activations/deactivate", post(deactivate_handler::<S>))
        .route("/api/v1/validate", post(validate_handler::<S>))
        .route(
            "/api/v1/licenses/{id}/activations",
            get(activations_handler::<S>),
        )
        .with_state(authority)
}
