//! HTTP layer: status and content-type checks, response capture.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{ProbeDockError, ProbeDockResult, UploadResponse};
use crate::server::ResolvedServer;

/// Media type of the discovery document.
pub(crate) const HAL_JSON: &str = "application/hal+json";

/// Link relation pointing at the payload submission endpoint.
pub(crate) const PAYLOADS_REL: &str = "v1:test-payloads";

/// HTTP backend for making requests (holds the reqwest client).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
}

impl HttpBackend {
    /// Fetch the API root and follow the payload link relation.
    pub(crate) async fn discover_payload_url(
        &self,
        server: &ResolvedServer,
    ) -> ProbeDockResult<String> {
        debug!(url = %server.api_url, "discovering payload endpoint");

        let response = self
            .client
            .get(&server.api_url)
            .header(AUTHORIZATION, server.credentials.authorization())
            .header(ACCEPT, HAL_JSON)
            .send()
            .await?;

        let status = response.status();
        let captured = capture(response).await;

        if status != StatusCode::OK {
            return Err(ProbeDockError::upload(
                format!(
                    "Expected HTTP 200 OK when discovering the API, got {}",
                    status.as_u16()
                ),
                Some(captured),
            ));
        }

        let is_hal = captured
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with(HAL_JSON));
        if !is_hal {
            return Err(ProbeDockError::upload(
                format!(
                    "Expected the API root to be {}, got {}",
                    HAL_JSON,
                    captured.content_type.as_deref().unwrap_or("no content type")
                ),
                Some(captured),
            ));
        }

        let href = serde_json::from_str::<serde_json::Value>(&captured.body)
            .ok()
            .and_then(|root| {
                root.pointer(&format!("/_links/{}/href", PAYLOADS_REL))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            });

        let Some(href) = href else {
            return Err(ProbeDockError::upload(
                format!("Expected the API root to have a {} link", PAYLOADS_REL),
                Some(captured),
            ));
        };

        let url = url::Url::parse(&server.api_url)
            .and_then(|base| base.join(&href))
            .map_err(|e| {
                ProbeDockError::upload(
                    format!("Invalid {} link {:?}: {}", PAYLOADS_REL, href, e),
                    Some(captured.clone()),
                )
            })?;

        debug!(url = %url, "payload endpoint discovered");
        Ok(url.into())
    }

    /// POST the payload body; anything but 202 Accepted is a failure.
    pub(crate) async fn submit(
        &self,
        url: &str,
        server: &ResolvedServer,
        content_type: &str,
        body: String,
    ) -> ProbeDockResult<()> {
        debug!(url = %url, content_type = %content_type, bytes = body.len(), "submitting payload");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, server.credentials.authorization())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        Err(ProbeDockError::upload(
            format!(
                "Expected HTTP 202 Accepted when submitting payload, got {}",
                status.as_u16()
            ),
            Some(capture(response).await),
        ))
    }
}

async fn capture(response: reqwest::Response) -> UploadResponse {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response.text().await.unwrap_or_default();

    UploadResponse {
        status,
        content_type,
        body,
    }
}
