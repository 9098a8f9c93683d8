//! Object filters evaluated before a handler runs
//!
//! Predicates decide whether a decoded object is in scope for the webhook.
//! An object that fails any predicate is admitted unchanged and its handler
//! is never invoked.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::object::Object;

/// Boolean filter over a decoded object
pub trait Predicate: Send + Sync {
    /// Whether `obj` should be handed to its handler
    fn matches(&self, obj: &dyn Object) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&dyn Object) -> bool + Send + Sync,
{
    fn matches(&self, obj: &dyn Object) -> bool {
        self(obj)
    }
}

/// Shared, type-erased predicate
pub type BoxPredicate = Arc<dyn Predicate>;

/// AND all predicates together, stopping at the first that fails
///
/// An empty chain matches everything.
pub fn eval_all(obj: &dyn Object, predicates: &[BoxPredicate]) -> bool {
    predicates.iter().all(|p| p.matches(obj))
}

/// Invert a predicate
pub fn not(predicate: BoxPredicate) -> BoxPredicate {
    Arc::new(move |obj: &dyn Object| !predicate.matches(obj))
}

/// Match when any of the given predicates matches
pub fn any(predicates: Vec<BoxPredicate>) -> BoxPredicate {
    Arc::new(move |obj: &dyn Object| predicates.iter().any(|p| p.matches(obj)))
}

/// Match when all of the given predicates match
pub fn all(predicates: Vec<BoxPredicate>) -> BoxPredicate {
    Arc::new(move |obj: &dyn Object| eval_all(obj, &predicates))
}

/// Match objects carrying `key=value` in `metadata.labels`
pub fn has_label(key: impl Into<String>, value: impl Into<String>) -> BoxPredicate {
    let (key, value) = (key.into(), value.into());
    Arc::new(move |obj: &dyn Object| {
        metadata_field(obj, "labels")
            .and_then(|labels| labels.get(&key).cloned())
            .is_some_and(|v| v.as_str() == Some(value.as_str()))
    })
}

/// Match objects carrying `key` in `metadata.labels`, whatever its value
pub fn has_label_key(key: impl Into<String>) -> BoxPredicate {
    let key = key.into();
    Arc::new(move |obj: &dyn Object| {
        metadata_field(obj, "labels").is_some_and(|labels| labels.get(&key).is_some())
    })
}

/// Match objects in one of the given namespaces
pub fn in_namespaces<I, S>(namespaces: I) -> BoxPredicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let namespaces: BTreeSet<String> = namespaces.into_iter().map(Into::into).collect();
    Arc::new(move |obj: &dyn Object| {
        metadata_field(obj, "namespace")
            .and_then(|ns| ns.as_str().map(|s| namespaces.contains(s)))
            .unwrap_or(false)
    })
}

/// Match objects whose `metadata.name` equals `name`
pub fn has_name(name: impl Into<String>) -> BoxPredicate {
    let name = name.into();
    Arc::new(move |obj: &dyn Object| {
        metadata_field(obj, "name").is_some_and(|n| n.as_str() == Some(name.as_str()))
    })
}

fn metadata_field(obj: &dyn Object, field: &str) -> Option<Value> {
    let mut json = obj.to_json().ok()?;
    json.get_mut("metadata")?.get_mut(field).map(Value::take)
}
