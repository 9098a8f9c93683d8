//! Type and handler registries
//!
//! Both registries are filled once by [`crate::builder::HandlerBuilder`] and
//! never change afterwards, so concurrent requests read them without locking.
//! Every identifier in the handler registry has a prototype in the type
//! registry because the builder only inserts the two together.

use std::collections::HashMap;
use std::sync::Arc;

use kube::core::GroupVersionKind;

use crate::handler::{Mutator, Validator, ValidatorAdapter};
use crate::object::Object;
use crate::scheme::{display_gvk, internal_gvk};
use crate::{Error, Result};

/// Handler stored for a registered identifier
#[derive(Clone)]
pub struct HandlerEntry {
    mutator: Arc<dyn Mutator>,
    validator_originated: bool,
}

impl HandlerEntry {
    /// Entry for a handler that may produce patches
    pub fn mutator(mutator: Arc<dyn Mutator>) -> Self {
        Self {
            mutator,
            validator_originated: false,
        }
    }

    /// Entry for a validator, wrapped in a [`ValidatorAdapter`]
    pub fn validator<V: Validator + 'static>(validator: V) -> Self {
        Self {
            mutator: Arc::new(ValidatorAdapter::new(validator)),
            validator_originated: true,
        }
    }

    /// The handler to invoke
    pub fn handler(&self) -> &dyn Mutator {
        self.mutator.as_ref()
    }

    /// Whether the handler was registered as a validator
    ///
    /// Responses for validator entries never carry a patch.
    pub fn is_validator(&self) -> bool {
        self.validator_originated
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("validator_originated", &self.validator_originated)
            .finish_non_exhaustive()
    }
}

/// Decode targets keyed by identifier
#[derive(Debug, Default)]
pub struct TypeRegistry {
    prototypes: HashMap<GroupVersionKind, Box<dyn Object>>,
}

impl TypeRegistry {
    /// Prototype registered under exactly this identifier
    pub fn get(&self, gvk: &GroupVersionKind) -> Option<&dyn Object> {
        self.prototypes.get(gvk).map(|p| &**p)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

/// Handlers keyed by identifier
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    entries: HashMap<GroupVersionKind, HandlerEntry>,
}

impl HandlerRegistry {
    /// Handler registered under exactly this identifier
    pub fn get(&self, gvk: &GroupVersionKind) -> Option<&HandlerEntry> {
        self.entries.get(gvk)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the dispatcher needs for one resolved request
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// Identifier the entry was registered under
    pub gvk: &'a GroupVersionKind,
    /// Decode target
    pub prototype: &'a dyn Object,
    /// Handler to invoke
    pub entry: &'a HandlerEntry,
}

/// Immutable pair of type and handler registries
#[derive(Debug, Default)]
pub struct Registry {
    types: TypeRegistry,
    handlers: HandlerRegistry,
}

impl Registry {
    /// Register a prototype and its handler under `gvk`
    ///
    /// Fails if `gvk` is already taken.
    pub(crate) fn insert(
        &mut self,
        gvk: GroupVersionKind,
        prototype: Box<dyn Object>,
        entry: HandlerEntry,
    ) -> Result<()> {
        if self.handlers.entries.contains_key(&gvk) {
            return Err(Error::DuplicateType {
                gvk: display_gvk(&gvk),
            });
        }
        self.types.prototypes.insert(gvk.clone(), prototype);
        self.handlers.entries.insert(gvk, entry);
        Ok(())
    }

    /// Find the registration serving `gvk`
    ///
    /// Tries an exact match first, then the internal-version registration for
    /// the same group and kind. Duplicate identifiers are rejected at build
    /// time, so at most one internal-version entry can match.
    pub fn resolve(&self, gvk: &GroupVersionKind) -> Result<Resolved<'_>> {
        let key = if self.handlers.entries.contains_key(gvk) {
            gvk.clone()
        } else {
            internal_gvk(&gvk.group, &gvk.kind)
        };

        let (gvk_key, entry) = self.handlers.entries.get_key_value(&key).ok_or_else(|| {
            Error::UnrecognizedKind {
                gvk: display_gvk(gvk),
            }
        })?;
        let prototype = self.types.get(&key).ok_or_else(|| Error::UnrecognizedKind {
            gvk: display_gvk(gvk),
        })?;

        Ok(Resolved {
            gvk: gvk_key,
            prototype,
            entry,
        })
    }

    /// Registered identifiers, sorted for stable output
    pub fn kinds(&self) -> Vec<&GroupVersionKind> {
        let mut kinds: Vec<_> = self.handlers.entries.keys().collect();
        kinds.sort_by(|a, b| {
            (&a.group, &a.kind, &a.version).cmp(&(&b.group, &b.kind, &b.version))
        });
        kinds
    }

    /// Registered identifiers with their handler entries, sorted like [`Registry::kinds`]
    pub fn entries(&self) -> Vec<(&GroupVersionKind, &HandlerEntry)> {
        self.kinds()
            .into_iter()
            .filter_map(|gvk| self.handlers.get(gvk).map(|entry| (gvk, entry)))
            .collect()
    }

    /// Decode targets
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Handlers
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }
}
