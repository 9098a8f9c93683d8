//! AdmissionReview adapter
//!
//! Converts Kubernetes `AdmissionReview` payloads into dispatcher requests and
//! turns the dispatcher's outcome back into an `AdmissionResponse`.

use std::sync::Arc;

use axum::{extract::State, Json};
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use tracing::{debug, error};

use crate::context::AdmissionContext;
use crate::dispatcher::{Dispatcher, Request};
use crate::error::STATUS_INTERNAL_ERROR;
use crate::response::Outcome;
use crate::scheme::display_gvk;
use crate::{Error, Result};

use super::WebhookState;

/// Handle an admission review posted by the API server
pub async fn review_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    Json(handle_review(&state.dispatcher, body).await)
}

/// Dispatch one admission review and wrap the result in a review
pub async fn handle_review(
    dispatcher: &Dispatcher,
    review: AdmissionReview<DynamicObject>,
) -> AdmissionReview<DynamicObject> {
    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return AdmissionResponse::invalid(e.to_string()).into_review();
        }
    };

    respond(dispatcher, &req).await.into_review()
}

/// Dispatch one admission request
///
/// Requests without a new object (DELETE) are admitted without running any
/// handler. This differs from calling [`Dispatcher::handle`] directly, which
/// denies empty object bytes with a 400 decode error; handlers here never see
/// delete requests, and the generated webhook rules only cover CREATE and
/// UPDATE.
pub async fn respond(
    dispatcher: &Dispatcher,
    req: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    // DELETE requests carry only the old object; nothing to admit
    if req.object.is_none() {
        debug!(
            uid = %req.uid,
            kind = %display_gvk(&req.kind),
            "No object in request, allowing unchanged"
        );
        return AdmissionResponse::from(req);
    }

    let request = match to_request(req) {
        Ok(request) => request,
        Err(e) => return deny(req, e.status_code(), e.to_string()),
    };

    let ctx = AdmissionContext::new(req.uid.clone())
        .with_operation((&req.operation).into())
        .with_dry_run(req.dry_run);

    let outcome = dispatcher.handle(&ctx, &request).await;
    into_response(req, outcome)
}

/// Build a dispatcher request from the raw objects of an admission request
fn to_request(req: &AdmissionRequest<DynamicObject>) -> Result<Request> {
    let kind = display_gvk(&req.kind);
    let object = encode(&kind, req.object.as_ref())?;
    let old_object = encode(&kind, req.old_object.as_ref())?;

    let mut request = Request::new(req.kind.clone(), object).with_old_object(old_object);
    if !req.name.is_empty() {
        request = request.with_name(req.name.clone());
    }
    if let Some(namespace) = &req.namespace {
        request = request.with_namespace(namespace.clone());
    }
    Ok(request)
}

/// Serialize an embedded object, absent objects become empty bytes
fn encode(kind: &str, obj: Option<&DynamicObject>) -> Result<Vec<u8>> {
    match obj {
        Some(obj) => serde_json::to_vec(obj)
            .map_err(|e| Error::serialization(kind, format!("request object: {e}"))),
        None => Ok(Vec::new()),
    }
}

fn into_response(req: &AdmissionRequest<DynamicObject>, outcome: Outcome) -> AdmissionResponse {
    match outcome {
        Outcome::Allow => AdmissionResponse::from(req),
        Outcome::Patch { patch, .. } => match AdmissionResponse::from(req).with_patch(patch) {
            Ok(response) => response,
            Err(e) => {
                error!(uid = %req.uid, error = %e, "Failed to serialize patch");
                deny(
                    req,
                    STATUS_INTERNAL_ERROR,
                    format!("patch serialization error: {e}"),
                )
            }
        },
        Outcome::Deny { code, reason } => deny(req, code, reason),
    }
}

fn deny(req: &AdmissionRequest<DynamicObject>, code: u16, reason: String) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(req).deny(reason);
    response.result.code = code;
    response
}
