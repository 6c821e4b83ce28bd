//! Domain-level error types.
//!
//! These errors are transport agnostic. The CLI adapter renders them for
//! humans; services build them from port errors.

use serde::{Deserialize, Serialize};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The requested record does not exist.
    NotFound,
    /// The persistent store cannot be opened or written.
    StorageUnavailable,
    /// The remote service could not be reached.
    NetworkFailure,
    /// The remote service answered with a non-success response.
    RemoteRejected,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    const fn fallback_message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid request",
            Self::NotFound => "not found",
            Self::StorageUnavailable => "local storage unavailable",
            Self::NetworkFailure => "remote service unreachable",
            Self::RemoteRejected => "remote service rejected the request",
            Self::InternalError => "internal error",
        }
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` is non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use story_sync::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("missing");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    code: ErrorCode,
    message: String,
}

/// Validation errors emitted by the fallible constructor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The supplied message was blank.
    #[error("error message must not be empty")]
    EmptyMessage,
}

impl Error {
    /// Create a new error.
    ///
    /// Blank messages are replaced with a generic description of `code`.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::try_new(code, message).unwrap_or_else(|_| Self {
            code,
            message: code.fallback_message().to_owned(),
        })
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self { code, message })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Whether the failure is a transient remote problem worth retrying later.
    pub fn is_network_failure(&self) -> bool {
        self.code == ErrorCode::NetworkFailure
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::StorageUnavailable`].
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::NetworkFailure`].
    pub fn network_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkFailure, message)
    }

    /// Convenience constructor for [`ErrorCode::RemoteRejected`].
    pub fn remote_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RemoteRejected, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn invalid_request_constructor_sets_code() {
        let err = Error::invalid_request("bad");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.message(), "bad");
    }

    #[rstest]
    fn try_new_rejects_empty_messages() {
        let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
        assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
    }

    #[rstest]
    #[case(ErrorCode::StorageUnavailable, "local storage unavailable")]
    #[case(ErrorCode::NetworkFailure, "remote service unreachable")]
    fn new_substitutes_fallback_for_blank_messages(
        #[case] code: ErrorCode,
        #[case] expected: &str,
    ) {
        let err = Error::new(code, "");
        assert_eq!(err.message(), expected);
    }

    #[rstest]
    fn only_network_failures_count_as_network_failures() {
        assert!(Error::network_failure("offline").is_network_failure());
        assert!(!Error::remote_rejected("400").is_network_failure());
    }

    #[rstest]
    fn serialises_code_in_snake_case() {
        let value = serde_json::to_value(Error::storage_unavailable("disk full"))
            .expect("error serialises");
        assert_eq!(value["code"], "storage_unavailable");
        assert_eq!(value["message"], "disk full");
    }
}
