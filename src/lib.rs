//! Lattice Webhook - type-dispatched admission handling for Kubernetes
//!
//! Handlers are registered against Rust types. At build time each type is
//! resolved to its group/version/kind through a [`Scheme`]; at request time the
//! kind named by the admission request selects the handler, the raw object is
//! decoded into a fresh instance of the registered type, and the handler's
//! changes come back as an RFC 6902 JSON patch.
//!
//! # Architecture
//!
//! - Registration happens once through [`HandlerBuilder`], which freezes the
//!   type and handler registries into a [`Dispatcher`]
//! - The dispatcher is shared across requests and never locks
//! - Validators run through the same path as mutators but never patch
//!
//! # Modules
//!
//! - [`scheme`] - Type to group/version/kind mapping
//! - [`object`] - Type-erased admission objects
//! - [`handler`] - Mutator and Validator traits
//! - [`predicate`] - Filters deciding whether a handler runs
//! - [`registry`] - Type and handler registries
//! - [`builder`] - Registry construction
//! - [`dispatcher`] - Per-request decode, invoke, and diff
//! - [`response`] - Admission outcomes and patch computation
//! - [`context`] - Per-request metadata and cancellation
//! - [`config`] - Dispatcher and webhook settings
//! - [`webhook`] - AdmissionReview adapter, HTTP router, and webhook configuration
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod builder;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod object;
pub mod predicate;
pub mod registry;
pub mod response;
pub mod scheme;
pub mod webhook;

pub use builder::HandlerBuilder;
pub use config::{DispatcherConfig, WebhookSettings};
pub use context::{AdmissionContext, Operation};
pub use dispatcher::{Dispatcher, Request};
pub use error::Error;
pub use handler::{Mutator, Validator, ValidatorAdapter};
pub use object::{prototype, Object};
pub use predicate::{BoxPredicate, Predicate};
pub use response::Outcome;
pub use scheme::Scheme;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
