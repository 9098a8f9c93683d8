//! Error types for the admission webhook core
//!
//! Errors fall into three groups:
//! - Construction errors, raised while building the registries before serving
//! - Client errors, raised per request and surfaced as HTTP 400 denials
//! - Internal errors, raised while serializing a patch response (HTTP 500)

use std::time::Duration;

use thiserror::Error;

/// Status code for denials caused by the request or the handler
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status code for denials caused by a failure inside the webhook
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Which side of an admission request an object came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRole {
    /// The incoming (new) object
    New,
    /// The stored (old) object, present on UPDATE and DELETE
    Old,
}

impl std::fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectRole::New => f.write_str("object"),
            ObjectRole::Old => f.write_str("old object"),
        }
    }
}

/// Main error type for admission webhook operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A declared type is not known to the scheme
    #[error("type {type_name} is not registered in the scheme")]
    UnregisteredType {
        /// Rust type name of the offending prototype
        type_name: String,
    },

    /// A type is registered in the scheme under more than one identifier
    #[error("type {type_name} is registered under several kinds: {gvks}")]
    AmbiguousType {
        /// Rust type name of the offending prototype
        type_name: String,
        /// Rendered identifiers the type is registered under
        gvks: String,
    },

    /// The same type identifier was declared more than once
    #[error("duplicate registration for {gvk}")]
    DuplicateType {
        /// Rendered type identifier
        gvk: String,
    },

    /// No exact or internal-version entry matches the request kind
    #[error("unexpected request kind {gvk}")]
    UnrecognizedKind {
        /// Rendered type identifier from the request
        gvk: String,
    },

    /// Raw object bytes could not be decoded into the registered type
    #[error("could not decode {role} for {gvk}: {source}")]
    Decode {
        /// Rendered type identifier
        gvk: String,
        /// Which object failed to decode
        role: ObjectRole,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A mutator or validator refused the request
    #[error("{message}")]
    Rejected {
        /// Reason reported by the handler, passed through to the response
        message: String,
    },

    /// The request context was canceled while the handler was running
    #[error("admission of {gvk} was canceled")]
    Canceled {
        /// Rendered type identifier
        gvk: String,
    },

    /// The handler did not finish before the request deadline
    #[error("admission of {gvk} timed out after {timeout:?}")]
    DeadlineExceeded {
        /// Rendered type identifier
        gvk: String,
        /// Time budget the handler was given
        timeout: Duration,
    },

    /// An object or patch could not be serialized while building the response
    #[error("serialization error for {gvk}: {message}")]
    Serialization {
        /// Rendered type identifier
        gvk: String,
        /// Description of what failed
        message: String,
    },

    /// Webhook settings could not be parsed
    #[error("invalid webhook settings: {0}")]
    Settings(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a rejection carrying the handler's reason
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected {
            message: msg.into(),
        }
    }

    /// Create a serialization error for the given kind
    pub fn serialization(gvk: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            gvk: gvk.into(),
            message: msg.into(),
        }
    }

    /// HTTP status code used when this error denies a request
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Serialization { .. } => STATUS_INTERNAL_ERROR,
            _ => STATUS_BAD_REQUEST,
        }
    }

    /// Whether this error was raised while building the registries
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::UnregisteredType { .. }
                | Error::AmbiguousType { .. }
                | Error::DuplicateType { .. }
                | Error::Settings(_)
        )
    }

    /// The webhook core never retries; failures are final for the request
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: How Failures Reach the API Server
    // ==========================================================================

    /// Story: a handler's reason is passed through verbatim
    ///
    /// Users read the denial message in `kubectl` output, so the webhook core
    /// must not prefix or wrap what the handler said.
    #[test]
    fn story_rejection_message_is_verbatim() {
        let err = Error::rejected("size must not be negative");
        assert_eq!(err.to_string(), "size must not be negative");
        assert_eq!(err.status_code(), STATUS_BAD_REQUEST);
    }

    /// Story: decode failures name the object and the kind
    #[test]
    fn story_decode_failures_carry_context() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = Error::Decode {
            gvk: "apps/v1, Kind=Widget".to_string(),
            role: ObjectRole::Old,
            source,
        };

        let msg = err.to_string();
        assert!(msg.contains("old object"));
        assert!(msg.contains("Kind=Widget"));
        assert_eq!(err.status_code(), STATUS_BAD_REQUEST);
    }

    /// Story: only serialization problems are the webhook's own fault
    #[test]
    fn story_status_codes_by_category() {
        let client_errors = [
            Error::UnrecognizedKind {
                gvk: "x".to_string(),
            },
            Error::rejected("no"),
            Error::Canceled {
                gvk: "x".to_string(),
            },
            Error::DeadlineExceeded {
                gvk: "x".to_string(),
                timeout: Duration::from_secs(1),
            },
        ];
        for err in &client_errors {
            assert_eq!(err.status_code(), 400, "{err}");
            assert!(!err.is_retryable());
        }

        let err = Error::serialization("apps/v1, Kind=Widget", "boom");
        assert_eq!(err.status_code(), STATUS_INTERNAL_ERROR);
        assert!(err.to_string().contains("boom"));
    }

    /// Story: setup problems are distinguishable from request problems
    #[test]
    fn story_construction_errors_are_flagged() {
        let err = Error::UnregisteredType {
            type_name: "my::Widget".to_string(),
        };
        assert!(err.is_construction());
        assert!(err.to_string().contains("my::Widget"));

        let err = Error::DuplicateType {
            gvk: "apps/v1, Kind=Widget".to_string(),
        };
        assert!(err.is_construction());

        assert!(!Error::rejected("nope").is_construction());
    }
}
