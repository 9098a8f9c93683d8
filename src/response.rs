//! Admission outcomes and patch computation

use json_patch::Patch;
use serde_json::Value;

use crate::error::STATUS_INTERNAL_ERROR;
use crate::{Error, Result};

/// Result of dispatching one admission request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Admit the object unchanged
    Allow,
    /// Admit the object with the given RFC 6902 JSON patch applied
    Patch {
        /// Patch operations
        patch: Patch,
        /// Serialized form of `patch`, as sent to the API server
        raw: Vec<u8>,
    },
    /// Reject the request
    Deny {
        /// HTTP status code (400 or 500)
        code: u16,
        /// Human-readable reason
        reason: String,
    },
}

impl Outcome {
    /// Deny with the status code and message of `err`
    pub fn deny(err: &Error) -> Self {
        Outcome::Deny {
            code: err.status_code(),
            reason: err.to_string(),
        }
    }

    /// Whether the request is admitted
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Outcome::Deny { .. })
    }

    /// Serialized patch, if the outcome carries one
    pub fn patch_bytes(&self) -> Option<&[u8]> {
        match self {
            Outcome::Patch { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// HTTP status code for the outcome
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Deny { code, .. } => *code,
            Outcome::Allow | Outcome::Patch { .. } => 200,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Allow => "allowed",
            Outcome::Patch { .. } => "patched",
            Outcome::Deny { code, .. } if *code >= STATUS_INTERNAL_ERROR => "errored",
            Outcome::Deny { .. } => "denied",
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        Outcome::deny(&err)
    }
}

/// Compute a patch response from two serialized forms of one object
///
/// Returns [`Outcome::Allow`] when both documents are equal.
pub fn patch_from_raw(kind: &str, before: &[u8], after: &[u8]) -> Result<Outcome> {
    let before: Value = serde_json::from_slice(before)
        .map_err(|e| Error::serialization(kind, format!("original object: {e}")))?;
    let after: Value = serde_json::from_slice(after)
        .map_err(|e| Error::serialization(kind, format!("mutated object: {e}")))?;
    patch_from_values(kind, &before, &after)
}

/// Compute a patch response from two canonical JSON documents
pub fn patch_from_values(kind: &str, before: &Value, after: &Value) -> Result<Outcome> {
    let patch = json_patch::diff(before, after);
    if patch.0.is_empty() {
        return Ok(Outcome::Allow);
    }

    let raw = serde_json::to_vec(&patch)
        .map_err(|e| Error::serialization(kind, format!("patch: {e}")))?;
    Ok(Outcome::Patch { patch, raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // Patch Computation
    // =========================================================================

    #[test]
    fn equal_documents_allow() {
        let outcome =
            patch_from_raw("w", br#"{"a":1,"b":[1,2]}"#, br#"{"b":[1,2],"a":1}"#).unwrap();
        assert_eq!(outcome, Outcome::Allow);
        assert!(outcome.patch_bytes().is_none());
    }

    #[test]
    fn changed_field_produces_replace() {
        let outcome = patch_from_raw("w", br#"{"size":1}"#, br#"{"size":2}"#).unwrap();

        let raw = outcome.patch_bytes().expect("should carry a patch");
        let ops: Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(ops, json!([{"op": "replace", "path": "/size", "value": 2}]));
    }

    #[test]
    fn patch_applies_back_to_before() {
        let before = json!({
            "metadata": {"name": "w", "labels": {"a": "1"}},
            "spec": {"size": 1, "tags": ["x"]}
        });
        let after = json!({
            "metadata": {"name": "w", "labels": {"a": "1", "lattice.dev/owner": "me"}},
            "spec": {"size": 4, "tags": ["x", "y"]},
            "status": {}
        });

        let outcome = patch_from_values("w", &before, &after).unwrap();
        let Outcome::Patch { patch, raw } = outcome else {
            panic!("expected a patch");
        };

        let mut doc = before.clone();
        json_patch::patch(&mut doc, &patch.0).unwrap();
        assert_eq!(doc, after);

        let decoded: Patch = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded, patch);
    }

    #[test]
    fn malformed_input_is_an_internal_error() {
        let err = patch_from_raw("apps/v1, Kind=Widget", b"{", b"{}").unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("original object"));
    }

    // =========================================================================
    // Outcome Helpers
    // =========================================================================

    #[test]
    fn deny_carries_status_and_reason() {
        let outcome = Outcome::from(Error::rejected("size must be positive"));
        assert!(!outcome.is_allowed());
        assert_eq!(outcome.status_code(), 400);
        assert_eq!(outcome.label(), "denied");
        assert_eq!(
            outcome,
            Outcome::Deny {
                code: 400,
                reason: "size must be positive".to_string()
            }
        );

        let outcome = Outcome::from(Error::serialization("w", "boom"));
        assert_eq!(outcome.status_code(), 500);
        assert_eq!(outcome.label(), "errored");
    }

    #[test]
    fn allow_is_allowed() {
        assert!(Outcome::Allow.is_allowed());
        assert_eq!(Outcome::Allow.status_code(), 200);
        assert_eq!(Outcome::Allow.label(), "allowed");
    }
}
