//! Error types for docskill.
//!
//! Library crates use [`DocSkillError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The model-call variants form the failure taxonomy the pipeline reacts to:
//! [`DocSkillError::Transient`] is retried with backoff,
//! [`DocSkillError::ContentRejected`] fails the stage immediately, and
//! [`DocSkillError::MalformedResponse`] gets one stricter retry.

use std::path::PathBuf;

/// Top-level error type for all docskill operations.
#[derive(Debug, thiserror::Error)]
pub enum DocSkillError {
    /// Configuration loading or validation error (missing credential, bad TOML).
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure, rate limit, timeout or server-side hiccup.
    #[error("transient API error: {0}")]
    Transient(String),

    /// The model service permanently refused the input.
    #[error("content rejected: {0}")]
    ContentRejected(String),

    /// The model answered, but not in the shape we asked for.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad artifact, invalid document set, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The guidance synthesis stage failed; per-document artifacts are still valid.
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocSkillError>;

impl DocSkillError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::ContentRejected(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Short machine-friendly label used in run manifests and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Transient(_) => "transient",
            Self::ContentRejected(_) => "content_rejected",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Io { .. } => "io",
            Self::Validation { .. } => "validation",
            Self::Conversion(_) => "conversion",
            Self::Synthesis(_) => "synthesis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocSkillError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DocSkillError::rejected("unsupported image");
        assert!(err.to_string().contains("unsupported image"));
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(DocSkillError::transient("HTTP 429").is_retryable());
        assert!(!DocSkillError::rejected("policy").is_retryable());
        assert!(!DocSkillError::malformed("no score block").is_retryable());
        assert!(!DocSkillError::config("no key").is_retryable());
    }

    #[test]
    fn kind_labels() {
        assert_eq!(DocSkillError::Synthesis("x".into()).kind(), "synthesis");
        assert_eq!(DocSkillError::malformed("x").kind(), "malformed_response");
    }
}
