//! Error types for the publishing pipeline.

/// HTTP response captured when the collector rejects an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// HTTP status code.
    pub status: u16,

    /// Content-Type header, if any.
    pub content_type: Option<String>,

    /// Raw response body.
    pub body: String,
}

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum ProbeDockError {
    /// Payload could not be built (e.g. missing project version or API identifier).
    #[error("{message}")]
    Payload { message: String },

    /// Staleness cache could not be loaded or saved.
    #[error("{message}")]
    Cache { message: String },

    /// Upload was rejected, or the server profile is unusable.
    #[error("{message}")]
    Upload {
        message: String,
        response: Option<UploadResponse>,
    },

    /// Network error.
    #[error("network error: {message}")]
    Network { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Correlation uid could not be generated, stored or cleaned.
    #[error("{message}")]
    Uid { message: String },

    /// Filesystem error outside of the cache.
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl ProbeDockError {
    pub(crate) fn upload(message: impl Into<String>, response: Option<UploadResponse>) -> Self {
        Self::Upload {
            message: message.into(),
            response,
        }
    }

    /// The HTTP response that caused the error, if one was received.
    pub fn response(&self) -> Option<&UploadResponse> {
        match self {
            Self::Upload { response, .. } => response.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProbeDockError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type ProbeDockResult<T> = Result<T, ProbeDockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_exposes_response() {
        let err = ProbeDockError::upload(
            "Expected HTTP 202 Accepted when submitting payload, got 500",
            Some(UploadResponse {
                status: 500,
                content_type: Some("text/plain".into()),
                body: "fubar".into(),
            }),
        );

        assert_eq!(err.response().map(|r| r.body.as_str()), Some("fubar"));
        assert!(err.to_string().contains("got 500"));
    }

    #[test]
    fn non_upload_errors_carry_no_response() {
        let err = ProbeDockError::Cache {
            message: "Missing cache options: workspace".into(),
        };
        assert!(err.response().is_none());
        assert_eq!(err.to_string(), "Missing cache options: workspace");
    }
}
