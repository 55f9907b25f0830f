//! Error taxonomy for reconciliation.

use serde_json::Value;
use thiserror::Error;

use crate::client::ClientError;
use crate::model::ResourceKind;
use crate::report::ReconcileResult;

/// Errors raised while locating, classifying or converging a resource.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReconcileError {
    /// A field required by the classified action is missing or malformed.
    /// Raised before any mutating call is issued.
    #[error("invalid value for `{field}`: {reason}")]
    Validation {
        /// Option name as written in the desired state.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// An operation needs an existing resource that could not be located.
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Key used for the lookup.
        key: String,
    },
    /// The provider could not be reached.
    #[error(transparent)]
    Transport(#[from] ClientError),
    /// The provider answered with a non-2xx status.
    #[error("{operation} failed with status {status}: {body}")]
    Provider {
        /// Operation being attempted.
        operation: String,
        /// HTTP status returned.
        status: u16,
        /// Decoded error payload, surfaced verbatim.
        body: Value,
    },
    /// The provider answered 2xx with a body of the wrong shape.
    #[error("unexpected response to {operation}: {message}")]
    UnexpectedResponse {
        /// Operation being attempted.
        operation: String,
        /// Description of the mismatch.
        message: String,
    },
}

impl ReconcileError {
    /// Builds a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds a validation error for a field the action requires.
    #[must_use]
    pub fn missing(field: &str, action: &str) -> Self {
        Self::validation(field, format!("required to {action}"))
    }

    /// Builds a not-found error.
    #[must_use]
    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Builds an unexpected-response error.
    #[must_use]
    pub fn unexpected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// A failed reconciliation together with whatever was achieved before it.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{error}")]
pub struct ReconcileFailure {
    /// The error that aborted the plan.
    #[source]
    pub error: ReconcileError,
    /// Partial outcome when at least the lookup succeeded.
    pub partial: Option<Box<ReconcileResult>>,
}

impl ReconcileFailure {
    /// Wraps an error raised after some plan steps may have executed.
    #[must_use]
    pub fn with_partial(error: ReconcileError, partial: ReconcileResult) -> Self {
        Self {
            error,
            partial: Some(Box::new(partial)),
        }
    }
}

impl From<ReconcileError> for ReconcileFailure {
    fn from(error: ReconcileError) -> Self {
        Self {
            error,
            partial: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_error_renders_body_verbatim() {
        let err = ReconcileError::Provider {
            operation: String::from("resize VM"),
            status: 409,
            body: json!({"errors": {"vm": "must be stopped"}}),
        };
        assert_eq!(
            err.to_string(),
            r#"resize VM failed with status 409: {"errors":{"vm":"must be stopped"}}"#
        );
    }

    #[test]
    fn not_found_names_the_kind() {
        let err = ReconcileError::not_found(ResourceKind::Network, "backend");
        assert_eq!(err.to_string(), "network 'backend' not found");
    }

    #[test]
    fn failure_displays_inner_error() {
        let failure = ReconcileFailure::from(ReconcileError::missing("password", "create VM"));
        assert_eq!(
            failure.to_string(),
            "invalid value for `password`: required to create VM"
        );
        assert!(failure.partial.is_none());
    }
}
