//! Error types for vcluster translation
//!
//! Errors carry enough structure (cluster side, kind, reconciler phase) to be
//! actionable from a log line. Soft misses such as "no reverse mapping" are
//! not errors at all; they are `Option`s at the call site.

use std::fmt;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Which cluster an operation talked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterSide {
    /// The underlying cluster that actually runs workloads
    Host,
    /// The virtual cluster whose object space is being translated
    Virtual,
}

impl fmt::Display for ClusterSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterSide::Host => f.write_str("host"),
            ClusterSide::Virtual => f.write_str("virtual"),
        }
    }
}

/// Main error type for vcluster translation
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A kind or resource does not exist in the given cluster
    #[error("{resource} not found in {side} cluster")]
    NotFound {
        /// The missing resource (e.g. "example.com/v1, Kind=Foo")
        resource: String,
        /// Cluster that was asked
        side: ClusterSide,
    },

    /// Schema mirroring failed
    #[error("schema error for {kind} during {phase}: {message}")]
    Schema {
        /// Group/version/kind being mirrored
        kind: String,
        /// Reconciler phase that failed (discovery, create, wait)
        phase: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
        /// The offending field, when known
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// The caller cancelled a blocking operation
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that observed the cancellation
        operation: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl Error {
    /// Create a not-found error for a resource in the given cluster
    pub fn not_found(resource: impl Into<String>, side: ClusterSide) -> Self {
        Self::NotFound {
            resource: resource.into(),
            side,
        }
    }

    /// Create a schema error for the given kind and reconciler phase
    pub fn schema(
        kind: impl Into<String>,
        phase: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Schema {
            kind: kind.into(),
            phase: phase.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn config_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Transport and server-side kube errors are transient. Client errors
    /// (4xx), missing kinds, bad configuration and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::NotFound { .. } => false,
            Error::Schema { .. } => false,
            Error::Config { .. } => false,
            Error::Serialization { .. } => false,
            Error::Cancelled { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Check if this error means "the thing does not exist"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            Error::Schema { phase, .. } => Some(phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    /// Story: a kind missing from the host cluster is fatal, not retried
    #[test]
    fn story_missing_kind_is_permanent() {
        let err = Error::not_found("example.com/v1, Kind=Foo", ClusterSide::Host);
        assert!(err.to_string().contains("host cluster"));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    /// Story: transient API failures while polling are retried
    #[test]
    fn story_server_errors_are_retryable() {
        let err = Error::from(api_error(503));
        assert!(err.is_retryable());
        assert!(!err.is_not_found());

        let err = Error::from(api_error(403));
        assert!(!err.is_retryable());

        let err = Error::from(api_error(404));
        assert!(err.is_not_found());
    }

    #[test]
    fn schema_error_names_kind_and_phase() {
        let err = Error::schema("example.com/v1, Kind=Foo", "create", "forbidden");
        let msg = err.to_string();
        assert!(msg.contains("Kind=Foo"));
        assert!(msg.contains("during create"));
        assert_eq!(err.context(), Some("create"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_error_keeps_field() {
        match Error::config_field("vclusterName", "must not be empty") {
            Error::Config { field, message } => {
                assert_eq!(field.as_deref(), Some("vclusterName"));
                assert_eq!(message, "must not be empty");
            }
            other => panic!("Expected Config variant, got {other:?}"),
        }
    }

    #[test]
    fn internal_error_default_context() {
        let err = Error::internal("unexpected state");
        assert_eq!(err.context(), Some(UNKNOWN_CONTEXT));
        assert!(err.to_string().contains("[unknown]"));
        assert!(err.is_retryable());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        let err = Error::cancelled("wait for crd");
        assert_eq!(err.to_string(), "wait for crd cancelled");
        assert!(!err.is_retryable());
    }

    #[test]
    fn cluster_side_display() {
        assert_eq!(ClusterSide::Host.to_string(), "host");
        assert_eq!(ClusterSide::Virtual.to_string(), "virtual");
    }
}
