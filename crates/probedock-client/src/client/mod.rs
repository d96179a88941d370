//! Uploads payloads to a collector.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::payload::{Payload, ProtocolVersion};
use crate::server::ResolvedServer;

mod http;

use http::HttpBackend;

pub const CLIENT_USER_AGENT: &str = concat!("probedock-client/", env!("CARGO_PKG_VERSION"));

/// Content type of version 1 payloads.
pub const PAYLOAD_V1_CONTENT_TYPE: &str = "application/vnd.probe-dock.payload.v1+json";

/// Content type of version 0 payloads.
pub const PAYLOAD_V0_CONTENT_TYPE: &str = "application/vnd.probe-dock.payload.v0+json";

/// Sends a payload to a server.
#[async_trait]
pub trait PayloadUploader: Send + Sync {
    async fn upload(&self, server: &ResolvedServer, payload: &Payload) -> ProbeDockResult<()>;
}

/// Uploader over HTTP.
///
/// Protocol version 1 posts to the fixed `{apiUrl}/publish` endpoint.
/// Protocol version 0 discovers the submission URL from the API root first.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    http: HttpBackend,
}

impl HttpUploader {
    pub fn new() -> ProbeDockResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| ProbeDockError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend { client },
        })
    }

    fn publish_url(server: &ResolvedServer) -> String {
        format!("{}/publish", server.api_url)
    }
}

#[async_trait]
impl PayloadUploader for HttpUploader {
    async fn upload(&self, server: &ResolvedServer, payload: &Payload) -> ProbeDockResult<()> {
        let body = payload.to_json().map_err(|e| ProbeDockError::Payload {
            message: format!("failed to serialize payload: {}", e),
        })?;

        match server.api_version {
            ProtocolVersion::V1 => {
                let url = Self::publish_url(server);
                self.http
                    .submit(&url, server, PAYLOAD_V1_CONTENT_TYPE, body)
                    .await
            }
            ProtocolVersion::V0 => {
                let url = self.http.discover_payload_url(server).await?;
                self.http
                    .submit(&url, server, PAYLOAD_V0_CONTENT_TYPE, body)
                    .await
            }
        }?;

        debug!(server = %server.name, "payload accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadOptions;
    use crate::project::ProjectProfile;
    use crate::run::TestRun;
    use crate::server::ServerProfile;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(version: ProtocolVersion) -> Payload {
        let mut run = TestRun::new(ProjectProfile::new("1.2.3", "abc"));
        run.set_duration(5);
        run.to_payload(&PayloadOptions {
            version,
            cache: None,
        })
        .unwrap()
    }

    fn token_server(uri: String) -> ResolvedServer {
        ServerProfile::new("test", format!("{}/api", uri))
            .with_token("test-token")
            .with_project_api_id("abc")
            .resolve()
            .unwrap()
    }

    fn key_server(uri: String) -> ResolvedServer {
        ServerProfile::new("legacy", format!("{}/api", uri))
            .with_api_key("kid", "ksecret")
            .with_api_version(ProtocolVersion::V0)
            .with_project_api_id("abc")
            .resolve()
            .unwrap()
    }

    #[tokio::test]
    async fn fixed_endpoint_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/publish"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("content-type", PAYLOAD_V1_CONTENT_TYPE))
            .and(body_json(json!({
                "projectId": "abc", "version": "1.2.3", "duration": 5, "results": []
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        uploader
            .upload(&token_server(mock_server.uri()), &payload(ProtocolVersion::V1))
            .await
            .expect("upload failed");
    }

    #[tokio::test]
    async fn fixed_endpoint_requires_202() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/publish"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        let err = uploader
            .upload(&token_server(mock_server.uri()), &payload(ProtocolVersion::V1))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Expected HTTP 202 Accepted"));
        let response = err.response().expect("response captured");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn discovery_upload() {
        let mock_server = MockServer::start().await;
        let root = json!({
            "_links": { "v1:test-payloads": { "href": format!("{}/api/payloads", mock_server.uri()) } }
        });

        Mock::given(method("GET"))
            .and(path("/api"))
            .and(header("authorization", r#"ProbeDockApiKey id="kid" secret="ksecret""#))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(root.to_string(), "application/hal+json"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/payloads"))
            .and(header("content-type", PAYLOAD_V0_CONTENT_TYPE))
            .and(body_json(json!({
                "r": [{ "p": "abc", "v": "1.2.3", "d": 5, "r": [] }]
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        uploader
            .upload(&key_server(mock_server.uri()), &payload(ProtocolVersion::V0))
            .await
            .expect("upload failed");
    }

    #[tokio::test]
    async fn discovery_rejects_wrong_content_type() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html/>", "text/html"))
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        let err = uploader
            .upload(&key_server(mock_server.uri()), &payload(ProtocolVersion::V0))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("application/hal+json"));
        assert_eq!(err.response().map(|r| r.body.as_str()), Some("<html/>"));
    }

    #[tokio::test]
    async fn discovery_requires_link_relation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"_links":{}}"#, "application/hal+json"),
            )
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        let err = uploader
            .upload(&key_server(mock_server.uri()), &payload(ProtocolVersion::V0))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("v1:test-payloads"));
        assert!(err.response().is_some());
    }

    #[tokio::test]
    async fn discovery_requires_200() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        let err = uploader
            .upload(&key_server(mock_server.uri()), &payload(ProtocolVersion::V0))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("got 401"));
        assert_eq!(err.response().map(|r| r.status), Some(401));
    }

    #[tokio::test]
    async fn relative_link_is_resolved_against_base_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"_links":{"v1:test-payloads":{"href":"/api/payloads"}}}"#,
                "application/hal+json; charset=utf-8",
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/payloads"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let uploader = HttpUploader::new().unwrap();
        uploader
            .upload(&key_server(mock_server.uri()), &payload(ProtocolVersion::V0))
            .await
            .expect("upload failed");
    }
}
