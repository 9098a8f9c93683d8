//! Type-erased resource objects
//!
//! Handlers are registered for heterogeneous resource types, so the registry
//! stores prototypes behind `dyn Object`. Every serde-capable, comparable type
//! gets the capability set for free through the blanket implementation below,
//! which covers both `k8s-openapi` types and hand-written CRD structs.

use std::any::Any;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Capabilities the dispatcher needs from a resource type
pub trait Object: Any + Send + Sync + Debug + 'static {
    /// Rust type name, used in construction errors
    fn type_name(&self) -> &'static str;

    /// Deep copy into a fresh, independently owned object
    fn clone_object(&self) -> Box<dyn Object>;

    /// Replace this object's contents with the JSON document in `raw`
    fn decode_from(&mut self, raw: &[u8]) -> Result<(), serde_json::Error>;

    /// Canonical JSON form, used for patch computation and metadata predicates
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Structural equality; objects of different types are never equal
    fn semantic_eq(&self, other: &dyn Object) -> bool;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> Object for T
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(self.clone())
    }

    fn decode_from(&mut self, raw: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(raw)?;
        Ok(())
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn semantic_eq(&self, other: &dyn Object) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Object {
    /// Whether the concrete type behind this object is `T`
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the concrete `T`, if that is what this object holds
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the concrete `T`, if that is what this object holds
    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Empty prototype for `T`, used as a decode target when registering handlers
pub fn prototype<T: Object + Default>() -> Box<dyn Object> {
    Box::new(T::default())
}
