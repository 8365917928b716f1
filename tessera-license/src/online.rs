//! HTTP client for the license server (feature `online`).

use crate::error::{LicenseError, LicenseResult};
use crate::fallback::OnlineValidator;
use crate::model::{Activation, ActivationRequest};
use crate::wire::{DeactivateRequest, ErrorBody, ValidateRequest, ValidationReport};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tessera_types::LicenseId;

/// Talks to a Tessera license server over its JSON API.
#[derive(Debug, Clone)]
pub struct RemoteValidator {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteValidator {
    /// Creates a client for `base_url` (e.g. `https://licenses.example.com`).
    ///
    /// `request_timeout` bounds each HTTP exchange independently of any
    /// deadline applied by [`FallbackValidator`](crate::FallbackValidator).
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> LicenseResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LicenseError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Activates this machine.
    pub async fn activate(&self, request: &ActivationRequest) -> LicenseResult<Activation> {
        self.post("/api/v1/activations", request).await
    }

    /// Releases this machine's activation slot.
    pub async fn deactivate(&self, license_id: LicenseId, hardware_id: &str) -> LicenseResult<()> {
        let body = DeactivateRequest {
            license_id,
            hardware_id: hardware_id.to_string(),
        };
        let _: Option<Activation> = self.post("/api/v1/activations/deactivate", &body).await?;
        Ok(())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> LicenseResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| LicenseError::Network(format!("request to {path} failed: {e}")))?;

        if response.status().is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| LicenseError::Network(format!("invalid response from {path}: {e}")));
        }

        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(body.into()),
            Err(_) => Err(LicenseError::Network(format!(
                "license server returned {status} for {path}"
            ))),
        }
    }
}

#[async_trait]
impl OnlineValidator for RemoteValidator {
    async fn validate_online(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> LicenseResult<ValidationReport> {
        let body = ValidateRequest {
            license: license_id.to_string(),
            hardware_id: hardware_id.to_string(),
        };
        self.post("/api/v1/validate", &body).await
    }
}
