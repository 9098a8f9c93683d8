//! Dispatcher and webhook configuration
//!
//! `DispatcherConfig` tunes request handling. `WebhookSettings` describes how
//! the webhook is registered with the API server and can be loaded from YAML:
//!
//! ```yaml
//! name: widgets.lattice.dev
//! path: /mutate/widgets
//! timeoutSeconds: 5
//! failurePolicy: Ignore
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Default handler budget, matching the API server's default webhook timeout
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 10;

/// Upper bound the API server accepts for `timeoutSeconds`
pub const MAX_TIMEOUT_SECONDS: u32 = 30;

/// Default path the webhook router serves
pub const DEFAULT_WEBHOOK_PATH: &str = "/mutate";

/// Request handling settings for the dispatcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum time a single handler invocation may take
    pub mutate_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            mutate_timeout: Duration::from_secs(u64::from(DEFAULT_TIMEOUT_SECONDS)),
        }
    }
}

impl DispatcherConfig {
    /// Create a config with the given handler timeout
    pub fn with_timeout(mutate_timeout: Duration) -> Self {
        Self { mutate_timeout }
    }
}

/// What the API server does when the webhook cannot be reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Reject the request
    #[default]
    Fail,
    /// Admit the request as if the webhook allowed it
    Ignore,
}

impl FailurePolicy {
    /// Value used in webhook configurations
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Fail => "Fail",
            FailurePolicy::Ignore => "Ignore",
        }
    }
}

/// Side effects handlers have outside the admitted object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffects {
    /// Handlers have no side effects
    #[default]
    None,
    /// Handlers skip side effects on dry-run requests
    NoneOnDryRun,
}

impl SideEffects {
    /// Value used in webhook configurations
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffects::None => "None",
            SideEffects::NoneOnDryRun => "NoneOnDryRun",
        }
    }
}

/// Registration settings for one admission webhook
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookSettings {
    /// Fully qualified webhook name (e.g. `widgets.lattice.dev`)
    pub name: String,
    /// HTTP path the webhook is served on
    pub path: String,
    /// Time the API server waits for a response
    pub timeout_seconds: u32,
    /// Behavior when the webhook is unavailable
    pub failure_policy: FailurePolicy,
    /// Declared side effects of the handlers
    pub side_effects: SideEffects,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            name: "webhook.lattice.dev".to_string(),
            path: DEFAULT_WEBHOOK_PATH.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            failure_policy: FailurePolicy::default(),
            side_effects: SideEffects::default(),
        }
    }
}

impl WebhookSettings {
    /// Parse settings from YAML, filling unset fields with defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Timeout clamped to the range the API server accepts
    pub fn effective_timeout_seconds(&self) -> u32 {
        self.timeout_seconds.clamp(1, MAX_TIMEOUT_SECONDS)
    }

    /// Dispatcher config whose handler budget matches the registration timeout
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::with_timeout(Duration::from_secs(u64::from(
            self.effective_timeout_seconds(),
        )))
    }
}
