//! Registry builder
//!
//! Collects `(handler, types)` declarations during setup and turns them into
//! an immutable [`Dispatcher`]. Every problem with the declarations surfaces
//! from [`HandlerBuilder::build`], before any request is served.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DispatcherConfig;
use crate::dispatcher::Dispatcher;
use crate::handler::{Mutator, Validator};
use crate::object::Object;
use crate::predicate::BoxPredicate;
use crate::registry::{HandlerEntry, Registry};
use crate::scheme::{display_gvk, Scheme};
use crate::Result;

struct Registration {
    entry: HandlerEntry,
    types: Vec<Box<dyn Object>>,
}

/// Builder for a [`Dispatcher`]
///
/// # Example
///
/// ```ignore
/// let dispatcher = HandlerBuilder::new(scheme)
///     .with_mutator(DefaultReplicas, [prototype::<Deployment>()])
///     .with_validator(RejectPrivileged, [prototype::<Pod>()])
///     .with_predicates([has_label_key("lattice.dev/service")])
///     .build()?;
/// ```
pub struct HandlerBuilder {
    scheme: Scheme,
    registrations: Vec<Registration>,
    predicates: Vec<BoxPredicate>,
    config: DispatcherConfig,
}

impl HandlerBuilder {
    /// Start a builder resolving types through `scheme`
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            registrations: Vec::new(),
            predicates: Vec::new(),
            config: DispatcherConfig::default(),
        }
    }

    /// Register `mutator` for each of the given prototype types
    pub fn with_mutator<M, I>(self, mutator: M, types: I) -> Self
    where
        M: Mutator + 'static,
        I: IntoIterator<Item = Box<dyn Object>>,
    {
        self.with_shared_mutator(Arc::new(mutator), types)
    }

    /// Register an already shared mutator for each of the given prototype types
    pub fn with_shared_mutator<I>(mut self, mutator: Arc<dyn Mutator>, types: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Object>>,
    {
        self.registrations.push(Registration {
            entry: HandlerEntry::mutator(mutator),
            types: types.into_iter().collect(),
        });
        self
    }

    /// Register `validator` for each of the given prototype types
    ///
    /// Validators never produce patches.
    pub fn with_validator<V, I>(mut self, validator: V, types: I) -> Self
    where
        V: Validator + 'static,
        I: IntoIterator<Item = Box<dyn Object>>,
    {
        self.registrations.push(Registration {
            entry: HandlerEntry::validator(validator),
            types: types.into_iter().collect(),
        });
        self
    }

    /// Append one predicate to the chain
    ///
    /// Accepts the combinators from [`crate::predicate`] as well as wrapped
    /// closures, e.g. `Arc::new(|obj: &dyn Object| ...)`.
    pub fn with_predicate(mut self, predicate: BoxPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Append predicates to the chain, preserving order
    pub fn with_predicates<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = BoxPredicate>,
    {
        self.predicates.extend(predicates);
        self
    }

    /// Override the dispatcher configuration
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve every declared type and freeze the registries
    ///
    /// Fails if a type is unknown to the scheme or an identifier is declared
    /// more than once.
    pub fn build(self) -> Result<Dispatcher> {
        let mut registry = Registry::default();

        for registration in self.registrations {
            for prototype in registration.types {
                let gvk = self.scheme.gvk_for(prototype.as_ref())?;
                debug!(
                    kind = %display_gvk(&gvk),
                    validator = registration.entry.is_validator(),
                    "registering admission handler"
                );
                registry.insert(gvk, prototype, registration.entry.clone())?;
            }
        }

        info!(
            kinds = registry.handlers().len(),
            predicates = self.predicates.len(),
            timeout = ?self.config.mutate_timeout,
            "admission dispatcher built"
        );

        Ok(Dispatcher::new(registry, self.predicates, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AdmissionContext;
    use crate::object::prototype;
    use crate::scheme::internal_gvk;
    use crate::Error;
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{ConfigMap, Pod};
    use kube::core::GroupVersionKind;
    use std::time::Duration;

    struct Noop;

    #[async_trait]
    impl Mutator for Noop {
        async fn mutate(
            &self,
            _ctx: &AdmissionContext,
            _new: &mut dyn Object,
            _old: Option<&dyn Object>,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Validator for Noop {
        async fn validate(
            &self,
            _ctx: &AdmissionContext,
            _new: &dyn Object,
            _old: Option<&dyn Object>,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn scheme() -> Scheme {
        let mut scheme = Scheme::new();
        scheme
            .register_resource::<Deployment>()
            .register_resource::<ConfigMap>()
            .register_resource::<Pod>();
        scheme
    }

    #[test]
    fn build_registers_every_declared_type() {
        let dispatcher = HandlerBuilder::new(scheme())
            .with_mutator(Noop, [prototype::<Deployment>(), prototype::<ConfigMap>()])
            .with_validator(Noop, [prototype::<Pod>()])
            .build()
            .unwrap();

        let registry = dispatcher.registry();
        assert_eq!(registry.handlers().len(), 3);
        assert_eq!(registry.types().len(), 3);

        let pod = registry
            .resolve(&GroupVersionKind::gvk("", "v1", "Pod"))
            .unwrap();
        assert!(pod.entry.is_validator());

        let deploy = registry
            .resolve(&GroupVersionKind::gvk("apps", "v1", "Deployment"))
            .unwrap();
        assert!(!deploy.entry.is_validator());
        assert!(deploy.prototype.is::<Deployment>());
    }

    #[test]
    fn every_handler_kind_has_a_prototype() {
        let dispatcher = HandlerBuilder::new(scheme())
            .with_mutator(Noop, [prototype::<Deployment>()])
            .with_validator(Noop, [prototype::<Pod>(), prototype::<ConfigMap>()])
            .build()
            .unwrap();

        let registry = dispatcher.registry();
        for gvk in registry.kinds() {
            assert!(registry.types().get(gvk).is_some(), "{gvk:?}");
        }
    }

    #[test]
    fn unknown_type_fails_build() {
        let err = HandlerBuilder::new(Scheme::new())
            .with_mutator(Noop, [prototype::<Deployment>()])
            .build()
            .unwrap_err();

        match err {
            Error::UnregisteredType { type_name } => assert!(type_name.contains("Deployment")),
            other => panic!("expected UnregisteredType, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_scheme_type_fails_build() {
        let mut scheme = Scheme::new();
        scheme
            .register::<Deployment>(GroupVersionKind::gvk("apps", "v1", "Deployment"))
            .register::<Deployment>(GroupVersionKind::gvk("apps", "v1beta1", "Deployment"));

        let err = HandlerBuilder::new(scheme)
            .with_mutator(Noop, [prototype::<Deployment>()])
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::AmbiguousType { .. }), "{err:?}");
        assert!(err.to_string().contains("apps/v1beta1, Kind=Deployment"));
    }

    #[test]
    fn duplicate_declarations_fail_build() {
        let err = HandlerBuilder::new(scheme())
            .with_mutator(Noop, [prototype::<Deployment>()])
            .with_validator(Noop, [prototype::<Deployment>()])
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateType { .. }));
        assert!(err.is_construction());
    }

    #[test]
    fn internal_registration_is_kept_verbatim() {
        let mut scheme = Scheme::new();
        scheme.register_internal::<Deployment>("apps", "Deployment");

        let dispatcher = HandlerBuilder::new(scheme)
            .with_mutator(Noop, [prototype::<Deployment>()])
            .build()
            .unwrap();

        assert_eq!(
            dispatcher.registry().kinds(),
            [&internal_gvk("apps", "Deployment")]
        );
    }

    #[test]
    fn predicates_and_config_are_carried_over() {
        let dispatcher = HandlerBuilder::new(scheme())
            .with_predicate(Arc::new(|_: &dyn Object| true))
            .with_predicate(crate::predicate::not(crate::predicate::has_label_key("b")))
            .with_predicates([crate::predicate::has_label_key("a")])
            .with_config(DispatcherConfig::with_timeout(Duration::from_secs(3)))
            .build()
            .unwrap();

        assert_eq!(dispatcher.predicate_count(), 3);
        assert_eq!(dispatcher.config().mutate_timeout, Duration::from_secs(3));
        assert!(dispatcher.registry().handlers().is_empty());
    }
}
