//! Kubernetes admission webhook surface
//!
//! Serves the dispatcher over HTTP and describes how the API server should
//! reach it:
//! - [`review`] converts `AdmissionReview` payloads to and from dispatcher calls
//! - [`configuration`] builds webhook configuration objects from the registry
//!
//! TLS termination is left to the caller; the router speaks plain HTTP.

pub mod configuration;
pub mod review;

use std::sync::Arc;

use axum::{routing::post, Router};

use crate::dispatcher::Dispatcher;

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Dispatcher serving every registered kind
    pub dispatcher: Dispatcher,
}

impl WebhookState {
    /// Create a new webhook state around a built dispatcher
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

/// Create the webhook router
///
/// `path` must start with `/`, e.g. [`crate::config::DEFAULT_WEBHOOK_PATH`].
pub fn webhook_router(state: Arc<WebhookState>, path: &str) -> Router {
    Router::new()
        .route(path, post(review::review_handler))
        .with_state(state)
}
