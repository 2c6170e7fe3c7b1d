//! Transport-agnostic error categories and the coordinator error mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use slicevcs_core::CoreError;

/// The seven transport error categories exposed to clients.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Empty id or out-of-range argument
    InvalidArgument,
    /// Slice, changeset, entry, or path absent
    NotFound,
    /// Duplicate slice or entry id
    AlreadyExists,
    /// Operation refused in the current system state
    FailedPrecondition,
    /// Files held by another merge in flight
    ResourceLocked,
    /// Serialization failure or invariant violation
    Internal,
    /// Object store unreachable or retries exhausted
    Unavailable,
}

impl ErrorCategory {
    /// HTTP status code used by the JSON dispatch layer.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::InvalidArgument => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::AlreadyExists => 409,
            ErrorCategory::FailedPrecondition => 412,
            ErrorCategory::ResourceLocked => 423,
            ErrorCategory::Internal => 500,
            ErrorCategory::Unavailable => 503,
        }
    }
}

/// A categorized, client-facing error.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ServiceError {
    /// Transport category
    pub category: ErrorCategory,
    /// Human-readable message
    pub message: String,
}

impl ServiceError {
    /// Builds an error with an explicit category.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// An InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidArgument, message)
    }

    /// A NotFound error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    /// An Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, message)
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        let category = match &err {
            CoreError::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            CoreError::SliceNotFound(_)
            | CoreError::ChangesetNotFound(_)
            | CoreError::EntryNotFound(_)
            | CoreError::ObjectMissing(_) => ErrorCategory::NotFound,
            CoreError::SliceAlreadyExists(_) | CoreError::EntryExists(_) => {
                ErrorCategory::AlreadyExists
            }
            CoreError::FailedPrecondition(_) => ErrorCategory::FailedPrecondition,
            CoreError::ResourceLocked { .. } => ErrorCategory::ResourceLocked,
            CoreError::Serialization(_) | CoreError::Internal(_) => ErrorCategory::Internal,
            CoreError::Unavailable(_) => ErrorCategory::Unavailable,
        };
        Self {
            category,
            message: err.to_string(),
        }
    }
}

/// Handler result alias.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slicevcs_core::types::{ChangesetId, FileId, SliceId};

    #[test]
    fn test_core_error_mapping() {
        let cases: Vec<(CoreError, ErrorCategory)> = vec![
            (
                CoreError::InvalidArgument("x".into()),
                ErrorCategory::InvalidArgument,
            ),
            (
                CoreError::SliceNotFound(SliceId::new("s")),
                ErrorCategory::NotFound,
            ),
            (
                CoreError::ChangesetNotFound(ChangesetId::new("c")),
                ErrorCategory::NotFound,
            ),
            (
                CoreError::SliceAlreadyExists(SliceId::new("s")),
                ErrorCategory::AlreadyExists,
            ),
            (
                CoreError::FailedPrecondition("x".into()),
                ErrorCategory::FailedPrecondition,
            ),
            (
                CoreError::ResourceLocked {
                    file: FileId::new("f"),
                    holder: SliceId::new("s"),
                },
                ErrorCategory::ResourceLocked,
            ),
            (CoreError::Internal("x".into()), ErrorCategory::Internal),
            (CoreError::Unavailable("x".into()), ErrorCategory::Unavailable),
        ];
        for (err, expected) in cases {
            assert_eq!(ServiceError::from(err).category, expected);
        }
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCategory::InvalidArgument.http_status(), 400);
        assert_eq!(ErrorCategory::NotFound.http_status(), 404);
        assert_eq!(ErrorCategory::AlreadyExists.http_status(), 409);
        assert_eq!(ErrorCategory::FailedPrecondition.http_status(), 412);
        assert_eq!(ErrorCategory::ResourceLocked.http_status(), 423);
        assert_eq!(ErrorCategory::Internal.http_status(), 500);
        assert_eq!(ErrorCategory::Unavailable.http_status(), 503);
    }

    #[test]
    fn test_error_display_is_message() {
        let err = ServiceError::not_found("slice missing");
        assert_eq!(format!("{err}"), "slice missing");
    }
}
