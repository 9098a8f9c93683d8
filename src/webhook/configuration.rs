//! Webhook registration objects
//!
//! Builds the `MutatingWebhookConfiguration` and `ValidatingWebhookConfiguration`
//! entries that route admission requests for every registered kind to the
//! dispatcher. Internal-version registrations match all versions of their kind.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::{discovery::ApiResource, GroupVersionKind};

use crate::config::WebhookSettings;
use crate::registry::Registry;
use crate::scheme::is_internal;

/// Operations the webhook intercepts
pub const OPERATIONS: [&str; 2] = ["CREATE", "UPDATE"];

/// Client config pointing at an in-cluster Service
pub fn service_client_config(
    namespace: &str,
    service: &str,
    port: i32,
    settings: &WebhookSettings,
    ca_bundle: Option<Vec<u8>>,
) -> WebhookClientConfig {
    WebhookClientConfig {
        service: Some(ServiceReference {
            name: service.to_string(),
            namespace: namespace.to_string(),
            path: Some(settings.path.clone()),
            port: Some(port),
        }),
        ca_bundle: ca_bundle.map(k8s_openapi::ByteString),
        ..Default::default()
    }
}

/// One rule per registered kind
pub fn rules(registry: &Registry) -> Vec<RuleWithOperations> {
    registry.kinds().into_iter().map(rule).collect()
}

/// Rules for kinds whose handler is a validator
pub fn validator_rules(registry: &Registry) -> Vec<RuleWithOperations> {
    registry
        .entries()
        .into_iter()
        .filter(|(_, entry)| entry.is_validator())
        .map(|(gvk, _)| rule(gvk))
        .collect()
}

fn rule(gvk: &GroupVersionKind) -> RuleWithOperations {
    let version = if is_internal(gvk) {
        "*".to_string()
    } else {
        gvk.version.clone()
    };

    RuleWithOperations {
        operations: Some(OPERATIONS.iter().map(|op| op.to_string()).collect()),
        api_groups: Some(vec![gvk.group.clone()]),
        api_versions: Some(vec![version]),
        resources: Some(vec![ApiResource::from_gvk(gvk).plural]),
        scope: None,
    }
}

/// Mutating webhook entry covering every registered kind
///
/// Validators are served through the same endpoint and never patch, so one
/// mutating webhook is enough to admit every registration.
pub fn mutating_webhook(
    registry: &Registry,
    settings: &WebhookSettings,
    client_config: WebhookClientConfig,
) -> MutatingWebhook {
    MutatingWebhook {
        name: settings.name.clone(),
        admission_review_versions: vec!["v1".to_string()],
        side_effects: settings.side_effects.as_str().to_string(),
        failure_policy: Some(settings.failure_policy.as_str().to_string()),
        match_policy: Some("Equivalent".to_string()),
        timeout_seconds: Some(settings.effective_timeout_seconds() as i32),
        rules: Some(rules(registry)),
        client_config,
        ..Default::default()
    }
}

/// Validating webhook entry covering only validator registrations
pub fn validating_webhook(
    registry: &Registry,
    settings: &WebhookSettings,
    client_config: WebhookClientConfig,
) -> ValidatingWebhook {
    ValidatingWebhook {
        name: settings.name.clone(),
        admission_review_versions: vec!["v1".to_string()],
        side_effects: settings.side_effects.as_str().to_string(),
        failure_policy: Some(settings.failure_policy.as_str().to_string()),
        match_policy: Some("Equivalent".to_string()),
        timeout_seconds: Some(settings.effective_timeout_seconds() as i32),
        rules: Some(validator_rules(registry)),
        client_config,
        ..Default::default()
    }
}

/// Cluster-scoped configuration object holding `webhook`
pub fn mutating_configuration(
    name: &str,
    webhook: MutatingWebhook,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![webhook]),
    }
}

/// Cluster-scoped configuration object holding `webhook`
pub fn validating_configuration(
    name: &str,
    webhook: ValidatingWebhook,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![webhook]),
    }
}
