//! Per-request admission dispatch
//!
//! The dispatcher handles one request in a single pass:
//! 1. Resolve the prototype and handler for the request kind
//! 2. Decode the new object, and the old object when one was sent
//! 3. Run the predicate chain; out-of-scope objects are allowed unchanged
//! 4. Run the handler on a copy of the decoded object
//! 5. Allow, or allow with a JSON patch when a mutator changed the copy
//!
//! Every failure becomes a denial. Nothing is shared between requests except
//! the read-only registry.

use kube::core::GroupVersionKind;
use tracing::{debug, error, warn};

use crate::config::DispatcherConfig;
use crate::context::AdmissionContext;
use crate::error::{ObjectRole, STATUS_BAD_REQUEST};
use crate::object::Object;
use crate::predicate::{eval_all, BoxPredicate};
use crate::registry::{HandlerEntry, Registry};
use crate::response::{patch_from_values, Outcome};
use crate::scheme::display_gvk;
use crate::{Error, Result};

/// One admission request, reduced to what dispatch needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Kind of the object being admitted
    pub kind: GroupVersionKind,
    /// Object name, when known (used for logging)
    pub name: Option<String>,
    /// Object namespace, when namespaced (used for logging)
    pub namespace: Option<String>,
    /// Raw JSON of the new object
    pub object: Vec<u8>,
    /// Raw JSON of the old object; empty unless UPDATE or DELETE
    pub old_object: Vec<u8>,
}

impl Request {
    /// Request for a new object of the given kind
    pub fn new(kind: GroupVersionKind, object: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            name: None,
            namespace: None,
            object: object.into(),
            old_object: Vec::new(),
        }
    }

    /// Attach the stored object for an UPDATE or DELETE
    pub fn with_old_object(mut self, old_object: impl Into<Vec<u8>>) -> Self {
        self.old_object = old_object.into();
        self
    }

    /// Attach the object name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach the object namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Routes admission requests to the handler registered for their kind
///
/// Built once by [`crate::builder::HandlerBuilder`] and shared across request
/// tasks behind an `Arc`.
pub struct Dispatcher {
    registry: Registry,
    predicates: Vec<BoxPredicate>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Registry,
        predicates: Vec<BoxPredicate>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            predicates,
            config,
        }
    }

    /// The immutable type and handler registries
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Request handling settings
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Number of predicates in the chain
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    /// Admit, patch, or deny one request
    pub async fn handle(&self, ctx: &AdmissionContext, request: &Request) -> Outcome {
        let kind = display_gvk(&request.kind);

        match self.dispatch(ctx, request, &kind).await {
            Ok(outcome) => {
                debug!(
                    uid = %ctx.uid,
                    kind = %kind,
                    namespace = ?request.namespace,
                    name = ?request.name,
                    outcome = outcome.label(),
                    "admission request handled"
                );
                outcome
            }
            Err(err) => {
                match &err {
                    Error::Rejected { .. }
                    | Error::Canceled { .. }
                    | Error::DeadlineExceeded { .. } => {
                        warn!(
                            uid = %ctx.uid,
                            kind = %kind,
                            namespace = ?request.namespace,
                            name = ?request.name,
                            error = %err,
                            "admission denied"
                        );
                    }
                    _ => {
                        error!(
                            uid = %ctx.uid,
                            kind = %kind,
                            namespace = ?request.namespace,
                            name = ?request.name,
                            error = %err,
                            "admission request failed"
                        );
                    }
                }
                Outcome::deny(&err)
            }
        }
    }

    async fn dispatch(
        &self,
        ctx: &AdmissionContext,
        request: &Request,
        kind: &str,
    ) -> Result<Outcome> {
        let resolved = self.registry.resolve(&request.kind)?;

        let obj = decode(resolved.prototype, &request.object, ObjectRole::New, kind)?;

        // only UPDATE and DELETE carry an old object
        let old = if request.old_object.is_empty() {
            None
        } else {
            Some(decode(
                resolved.prototype,
                &request.old_object,
                ObjectRole::Old,
                kind,
            )?)
        };

        if !eval_all(obj.as_ref(), &self.predicates) {
            debug!(uid = %ctx.uid, kind = %kind, "object filtered out by predicates, allowing");
            return Ok(Outcome::Allow);
        }

        let mut mutated = obj.clone_object();
        self.invoke(ctx, resolved.entry, mutated.as_mut(), old.as_deref(), kind)
            .await?;

        if resolved.entry.is_validator() {
            if !obj.semantic_eq(mutated.as_ref()) {
                debug!(uid = %ctx.uid, kind = %kind, "discarding changes made by validator");
            }
            return Ok(Outcome::Allow);
        }
        if obj.semantic_eq(mutated.as_ref()) {
            return Ok(Outcome::Allow);
        }

        let before = obj
            .to_json()
            .map_err(|e| Error::serialization(kind, format!("original object: {e}")))?;
        let after = mutated
            .to_json()
            .map_err(|e| Error::serialization(kind, format!("mutated object: {e}")))?;
        patch_from_values(kind, &before, &after)
    }

    /// Run the handler, bounded by the caller's cancellation and deadline
    async fn invoke(
        &self,
        ctx: &AdmissionContext,
        entry: &HandlerEntry,
        new: &mut dyn Object,
        old: Option<&dyn Object>,
        kind: &str,
    ) -> Result<()> {
        let budget = ctx.remaining(self.config.mutate_timeout);
        let call = tokio::time::timeout(budget, entry.handler().mutate(ctx, new, old));

        let result = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => {
                return Err(Error::Canceled { gvk: kind.to_string() });
            }
            result = call => result,
        };

        match result {
            Ok(Ok(())) => Ok(()),
            // handler failures always reject the request as a client error
            Ok(Err(err)) if err.status_code() == STATUS_BAD_REQUEST => Err(err),
            Ok(Err(err)) => Err(Error::rejected(err.to_string())),
            Err(_) => Err(Error::DeadlineExceeded {
                gvk: kind.to_string(),
                timeout: budget,
            }),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("predicates", &self.predicates.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Decode `raw` into a fresh copy of `prototype`
fn decode(
    prototype: &dyn Object,
    raw: &[u8],
    role: ObjectRole,
    kind: &str,
) -> Result<Box<dyn Object>> {
    let mut obj = prototype.clone_object();
    obj.decode_from(raw).map_err(|source| Error::Decode {
        gvk: kind.to_string(),
        role,
        source,
    })?;
    Ok(obj)
}
