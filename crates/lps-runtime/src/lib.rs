//! Reconciliation runtime.
//!
//! Wires the comparator, the deploy executor and the confirmation poller
//! into one run over a set of items:
//!
//! - [`Reconciler::check`] classifies and writes nothing,
//! - [`Reconciler::reconcile`] writes what is missing or stale and waits
//!   for each write to become visible, producing a [`Report`].

mod error;
mod orchestrator;
mod plan;
mod poller;
mod policy;
mod report;

pub use error::ConfigurationError;
pub use orchestrator::{DeploymentAttempt, Reconciler};
pub use plan::{Plan, Prerequisite, WriteOp, WriteStep};
pub use poller::ConvergencePoller;
pub use policy::{
    RunPolicy, DEFAULT_BOOTSTRAP_DEADLINE, DEFAULT_POLL_INTERVAL, DEFAULT_READ_DEPTH,
    DEFAULT_WRITE_DEADLINE,
};
pub use report::{CheckEntry, CheckReport, ItemReport, Report};

pub use tokio_util::sync::CancellationToken;
