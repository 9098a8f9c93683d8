//! Type resolution: concrete Rust types to group/version/kind
//!
//! The scheme is populated during setup with every resource type the webhook
//! may receive. The handler builder consults it to key its registries; it is
//! never touched on the request path.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use kube::core::{GroupVersionKind, Resource};

use crate::object::Object;
use crate::{Error, Result};

/// Version marker for internal (unversioned) type registrations
///
/// A handler registered under this version serves every concrete version of
/// the same group and kind that has no exact registration of its own.
pub const INTERNAL_VERSION: &str = "__internal";

/// Build the internal-version identifier for a group and kind
pub fn internal_gvk(group: &str, kind: &str) -> GroupVersionKind {
    GroupVersionKind::gvk(group, INTERNAL_VERSION, kind)
}

/// Whether the identifier uses the internal version marker
pub fn is_internal(gvk: &GroupVersionKind) -> bool {
    gvk.version == INTERNAL_VERSION
}

/// Render an identifier as `group/version, Kind=kind`
///
/// The core group (empty string) renders as `version, Kind=kind`.
pub fn display_gvk(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}, Kind={}", gvk.version, gvk.kind)
    } else {
        format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind)
    }
}

/// Registry of known Rust types and the identifiers they decode
///
/// A type may be registered under several identifiers, but such a type cannot
/// be resolved and fails the handler build.
#[derive(Debug, Default, Clone)]
pub struct Scheme {
    kinds: HashMap<TypeId, Vec<GroupVersionKind>>,
}

impl Scheme {
    /// Create an empty scheme
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `T` with an explicit identifier
    pub fn register<T: Object>(&mut self, gvk: GroupVersionKind) -> &mut Self {
        let gvks = self.kinds.entry(TypeId::of::<T>()).or_default();
        if !gvks.contains(&gvk) {
            gvks.push(gvk);
        }
        self
    }

    /// Associate a Kubernetes resource type with its static group/version/kind
    pub fn register_resource<K>(&mut self) -> &mut Self
    where
        K: Resource<DynamicType = ()> + Object,
    {
        let gvk = GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()));
        self.register::<K>(gvk)
    }

    /// Associate `T` with the internal version of a group and kind
    pub fn register_internal<T: Object>(&mut self, group: &str, kind: &str) -> &mut Self {
        self.register::<T>(internal_gvk(group, kind))
    }

    /// Resolve the identifier for an object's concrete type
    ///
    /// Fails if the type is unknown or registered under more than one
    /// identifier.
    pub fn gvk_for(&self, obj: &dyn Object) -> Result<GroupVersionKind> {
        match self.kinds.get(&Any::type_id(obj.as_any())).map(Vec::as_slice) {
            Some([gvk]) => Ok(gvk.clone()),
            Some(gvks) if !gvks.is_empty() => Err(Error::AmbiguousType {
                type_name: obj.type_name().to_string(),
                gvks: gvks.iter().map(display_gvk).collect::<Vec<_>>().join("; "),
            }),
            _ => Err(Error::UnregisteredType {
                type_name: obj.type_name().to_string(),
            }),
        }
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
