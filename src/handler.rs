//! Mutator and validator handlers
//!
//! Handlers receive type-erased objects and downcast to the concrete types
//! they were registered for. A mutator may change the new object in place;
//! the dispatcher turns that change into a JSON patch. A validator only sees
//! shared references, and whatever it does to them never produces a patch.

use async_trait::async_trait;

use crate::context::AdmissionContext;
use crate::object::Object;
use crate::Error;

/// Handler that may inspect and change an incoming object
///
/// Returning an error denies the request with the error's message.
#[async_trait]
pub trait Mutator: Send + Sync {
    /// Inspect and optionally modify `new`
    ///
    /// `old` is present for UPDATE and DELETE requests.
    async fn mutate(
        &self,
        ctx: &AdmissionContext,
        new: &mut dyn Object,
        old: Option<&dyn Object>,
    ) -> Result<(), Error>;
}

/// Handler that may only inspect an incoming object
#[async_trait]
pub trait Validator: Send + Sync {
    /// Accept or reject `new`
    ///
    /// `old` is present for UPDATE and DELETE requests.
    async fn validate(
        &self,
        ctx: &AdmissionContext,
        new: &dyn Object,
        old: Option<&dyn Object>,
    ) -> Result<(), Error>;
}

/// Runs a validator through the mutator interface
///
/// The wrapped validator only ever sees `&dyn Object`. Changes it still makes
/// through interior mutability are discarded by the dispatcher.
pub struct ValidatorAdapter<V> {
    validator: V,
}

impl<V: Validator> ValidatorAdapter<V> {
    /// Wrap a validator
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

}

#[async_trait]
impl<V: Validator> Mutator for ValidatorAdapter<V> {
    async fn mutate(
        &self,
        ctx: &AdmissionContext,
        new: &mut dyn Object,
        old: Option<&dyn Object>,
    ) -> Result<(), Error> {
        self.validator.validate(ctx, &*new, old).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Widget {
        size: i64,
    }

    struct NonNegative;

    #[async_trait]
    impl Validator for NonNegative {
        async fn validate(
            &self,
            _ctx: &AdmissionContext,
            new: &dyn Object,
            old: Option<&dyn Object>,
        ) -> Result<(), Error> {
            let widget = new
                .downcast_ref::<Widget>()
                .ok_or_else(|| Error::rejected("expected a Widget"))?;
            if widget.size < 0 {
                return Err(Error::rejected(format!("invalid size {}", widget.size)));
            }
            if let Some(old) = old.and_then(|o| o.downcast_ref::<Widget>()) {
                if widget.size < old.size {
                    return Err(Error::rejected("widgets cannot shrink"));
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn adapter_forwards_validation_result() {
        let adapter = ValidatorAdapter::new(NonNegative);
        let ctx = AdmissionContext::new("uid");

        let mut ok = Widget { size: 3 };
        assert!(adapter.mutate(&ctx, &mut ok, None).await.is_ok());

        let mut bad = Widget { size: -1 };
        let err = adapter.mutate(&ctx, &mut bad, None).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid size -1");
    }

    #[tokio::test]
    async fn adapter_passes_old_object_through() {
        let adapter = ValidatorAdapter::new(NonNegative);
        let ctx = AdmissionContext::new("uid");

        let old = Widget { size: 5 };
        let mut new = Widget { size: 4 };
        let err = adapter
            .mutate(&ctx, &mut new, Some(&old as &dyn Object))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shrink"));
    }

    #[tokio::test]
    async fn adapter_leaves_object_untouched() {
        let adapter = ValidatorAdapter::new(NonNegative);
        let ctx = AdmissionContext::new("uid");

        let mut widget = Widget { size: 9 };
        adapter.mutate(&ctx, &mut widget, None).await.unwrap();
        assert_eq!(widget, Widget { size: 9 });
    }
}
