//! Error taxonomy for the patch publication pipeline.

use thiserror::Error;

use crate::orchestrator::Stage;

/// Main error type for patchpilot operations.
#[derive(Error, Debug)]
pub enum PatchpilotError {
    // Request validation errors: reported before any network call
    #[error("Validation failed: {0}")]
    Validation(String),

    // Recognized absence signal (a 404 from the hosting API)
    #[error("Not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Provider errors: git hosting or generation API
    #[error("Provider request failed with status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Network request failed: {0}")]
    NetworkError(String),

    #[error("API authentication failed: {0}")]
    AuthenticationError(String),

    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PatchpilotError>,
    },

    #[error("Git URL parse error: {0}")]
    GitUrlError(#[from] git_url_parse::GitUrlParseError),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    // Generic wrapper for other errors
    #[error(transparent)]
    Other(#[from] color_eyre::Report),
}

/// Result type alias using PatchpilotError
pub type Result<T> = std::result::Result<T, PatchpilotError>;

impl PatchpilotError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a provider error from a status code and response body
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Attach the pipeline stage that produced this error
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage wrappers
    pub fn root(&self) -> &PatchpilotError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the caller supplied something malformed
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    /// Diagnostic detail surfaced to HTTP callers
    pub fn details(&self) -> String {
        match self.root() {
            Self::Provider { status, message } => {
                format!("status {status}: {message}")
            }
            other => other.to_string(),
        }
    }
}

// Implement From for std::io::Error - wraps in Other variant for generic I/O errors
impl From<std::io::Error> for PatchpilotError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(color_eyre::Report::from(err))
    }
}

// Implement From for reqwest errors (generation API)
impl From<reqwest::Error> for PatchpilotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::NetworkError(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => Self::AuthenticationError(err.to_string()),
                429 => Self::RateLimitExceeded,
                code => Self::provider(code, err.to_string()),
            }
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

// Implement From for octocrab errors (GitHub API). Every GitHub response
// keeps its status and the message GitHub supplied. Call sites that treat a
// 404 as absence convert it themselves.
impl From<octocrab::Error> for PatchpilotError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => Self::provider(
                source.status_code.as_u16(),
                source.message.clone(),
            ),
            _ => Self::NetworkError(format!("GitHub API error: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formats() {
        let err = PatchpilotError::validation("files[] is required");
        assert_eq!(err.to_string(), "Validation failed: files[] is required");

        let err = PatchpilotError::provider(422, "Reference already exists");
        assert_eq!(
            err.to_string(),
            "Provider request failed with status 422: Reference already exists"
        );
    }

    #[test]
    fn test_error_helpers() {
        let err = PatchpilotError::invalid_config("missing owner");
        assert!(matches!(err, PatchpilotError::InvalidConfig(_)));

        let err = PatchpilotError::validation("bad path");
        assert!(err.is_validation());
        assert!(!PatchpilotError::RateLimitExceeded.is_validation());
    }

    #[test]
    fn test_stage_wrapping_keeps_root() {
        let err =
            PatchpilotError::provider(500, "boom").in_stage(Stage::Publishing);
        assert_eq!(
            err.to_string(),
            "publishing stage failed: Provider request failed with status 500: boom"
        );
        assert!(matches!(
            err.root(),
            PatchpilotError::Provider { status: 500, .. }
        ));
        assert_eq!(err.details(), "status 500: boom");

        let err =
            PatchpilotError::validation("empty").in_stage(Stage::Publishing);
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{");
        let err: PatchpilotError = json_err.unwrap_err().into();
        assert!(matches!(err, PatchpilotError::JsonParseError(_)));
    }

    #[test]
    fn test_provider_not_found_keeps_status() {
        let err = PatchpilotError::provider(404, "Not Found")
            .in_stage(Stage::Publishing);

        assert!(!matches!(err.root(), PatchpilotError::NotFound(_)));
        assert_eq!(err.details(), "status 404: Not Found");
    }
}
