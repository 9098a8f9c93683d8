//! Per-request admission context
//!
//! Carries request metadata for logging and handler decisions, plus the
//! cancellation token and deadline the dispatcher enforces around handlers.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Admission operation, as reported by the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// Object is being created
    #[default]
    Create,
    /// Object is being updated
    Update,
    /// Object is being deleted
    Delete,
    /// Subresource connect (exec, port-forward, ...)
    Connect,
}

impl From<&kube::core::admission::Operation> for Operation {
    fn from(op: &kube::core::admission::Operation) -> Self {
        use kube::core::admission::Operation as Op;
        match op {
            Op::Create => Operation::Create,
            Op::Update => Operation::Update,
            Op::Delete => Operation::Delete,
            Op::Connect => Operation::Connect,
        }
    }
}

/// Context handed to every mutator and validator invocation
#[derive(Debug, Clone, Default)]
pub struct AdmissionContext {
    /// Request UID assigned by the API server
    pub uid: String,
    /// Operation being admitted
    pub operation: Operation,
    /// Whether the API server will discard the result
    pub dry_run: bool,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl AdmissionContext {
    /// Create a context for the given request UID
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Set the admission operation
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Mark the request as a dry run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fail the request if handlers are still running at `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail the request if handlers are still running after `timeout`
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Token that fires when the caller gives up on the request
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Deadline set by the caller, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the effective deadline
    ///
    /// The effective deadline is the earlier of the caller's deadline and
    /// `now + budget`.
    pub(crate) fn remaining(&self, budget: Duration) -> Duration {
        let now = Instant::now();
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now).min(budget),
            None => budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_metadata() {
        let ctx = AdmissionContext::new("uid-1")
            .with_operation(Operation::Update)
            .with_dry_run(true);

        assert_eq!(ctx.uid, "uid-1");
        assert_eq!(ctx.operation, Operation::Update);
        assert!(ctx.dry_run);
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancellation_is_shared_with_caller() {
        let token = CancellationToken::new();
        let ctx = AdmissionContext::new("uid").with_cancellation(token.clone());
        assert!(!ctx.cancellation().is_cancelled());

        token.cancel();
        assert!(ctx.cancellation().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_is_capped_by_budget_and_deadline() {
        let ctx = AdmissionContext::new("uid");
        assert_eq!(ctx.remaining(Duration::from_secs(5)), Duration::from_secs(5));

        let ctx = ctx.with_timeout(Duration::from_secs(2));
        assert_eq!(ctx.remaining(Duration::from_secs(5)), Duration::from_secs(2));
        assert_eq!(ctx.remaining(Duration::from_secs(1)), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(ctx.remaining(Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn operation_from_kube() {
        use kube::core::admission::Operation as Op;
        assert_eq!(Operation::from(&Op::Create), Operation::Create);
        assert_eq!(Operation::from(&Op::Delete), Operation::Delete);
    }
}
