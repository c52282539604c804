//! Confirmation polling.
//!
//! Polling is a single sequential loop per item: read, inspect, sleep until
//! the next tick, repeat. A read is never started while another one for the
//! same item is outstanding, and a slow read simply delays the next tick.
//!
//! Transitions:
//! - read equals the submitted value => `Confirmed`
//! - slot metadata names a foreign owner => `OwnershipConflict`
//! - not converged and the deploy's recorded result is a failure =>
//!   `Rejected`
//! - absent, not-yet-equal, or transient read error => wait, poll again
//! - deadline reached or run cancelled => `TimedOut`
//!
//! `TimedOut` is returned at the deadline, never before it.

use std::future::Future;
use std::time::Duration;

use lps_execution::LedgerGateway;
use lps_reconcile::{is_converged, DeployStatus, NamespaceState, ReadError, StateComparator};
use lps_schemas::{ObservedState, Outcome, SlotValue};
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one probe read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Probe {
    Converged,
    Pending,
    Conflict(String),
}

pub struct ConvergencePoller<G> {
    comparator: StateComparator<G>,
    interval: Duration,
    cancel: CancellationToken,
}

impl<G: LedgerGateway> ConvergencePoller<G> {
    pub fn new(comparator: StateComparator<G>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            comparator,
            interval,
            cancel,
        }
    }

    /// Poll `item_id` until it holds exactly `desired`. With a `deploy_id`,
    /// a failed execution of that deploy ends polling early.
    pub async fn poll_slot(
        &self,
        item_id: &str,
        desired: &str,
        deploy_id: Option<&str>,
        deadline: Instant,
    ) -> Outcome {
        self.run(item_id, deploy_id, deadline, move || {
            self.probe_slot(item_id, desired)
        })
        .await
    }

    /// Poll until the configured namespace exists.
    pub async fn poll_namespace(&self, deploy_id: Option<&str>, deadline: Instant) -> Outcome {
        let label = self.comparator.own_namespace().to_string();
        self.run(&label, deploy_id, deadline, move || self.probe_namespace())
            .await
    }

    async fn probe_slot(&self, item_id: &str, desired: &str) -> Result<Probe, ReadError> {
        let observed = match self.comparator.read_slot_data(item_id).await? {
            Some(data) => ObservedState::Present(SlotValue::new(data, None)),
            None => ObservedState::Absent,
        };
        if is_converged(desired, &observed) {
            return Ok(Probe::Converged);
        }
        if observed.is_absent() {
            return Ok(Probe::Pending);
        }
        // Someone else's value is visible; only an owner change is a conflict.
        let meta = self.comparator.read_slot_meta(item_id).await?;
        match meta.and_then(|m| m.owner) {
            Some(owner) if owner != self.comparator.own_namespace() => Ok(Probe::Conflict(owner)),
            _ => Ok(Probe::Pending),
        }
    }

    /// `Some(reason)` once the ledger reports the deploy failed. Lookup
    /// errors are ignored; the next tick asks again.
    async fn deploy_failure(&self, item_id: &str, deploy_id: &str) -> Option<String> {
        match self.comparator.deploy_status(deploy_id).await {
            Ok(DeployStatus::Failed(reason)) => Some(reason),
            Ok(status) => {
                debug!(item_id, deploy_id, ?status, "deploy result");
                None
            }
            Err(e) => {
                debug!(item_id, deploy_id, error = %e, "deploy result unreadable");
                None
            }
        }
    }

    async fn probe_namespace(&self) -> Result<Probe, ReadError> {
        match self.comparator.read_namespace().await? {
            NamespaceState::Absent => Ok(Probe::Pending),
            NamespaceState::Present { .. } => Ok(Probe::Converged),
        }
    }

    async fn run<F, Fut>(
        &self,
        item_id: &str,
        deploy_id: Option<&str>,
        deadline: Instant,
        mut probe: F,
    ) -> Outcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Probe, ReadError>>,
    {
        let started = Instant::now();
        let mut ticks: u32 = 0;

        while Instant::now() < deadline {
            ticks += 1;
            let res = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                r = timeout_at(deadline, probe()) => r,
            };

            match res {
                Err(_) => break,
                Ok(Ok(Probe::Converged)) => {
                    info!(
                        item_id,
                        ticks,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "confirmed on chain"
                    );
                    return Outcome::Confirmed;
                }
                Ok(Ok(Probe::Conflict(owner))) => {
                    warn!(item_id, %owner, ticks, "conflicting owner won the slot");
                    return Outcome::OwnershipConflict { owner };
                }
                Ok(Ok(Probe::Pending)) => {
                    debug!(item_id, ticks, "not converged yet");
                    if let Some(deploy_id) = deploy_id {
                        let failure = timeout_at(deadline, self.deploy_failure(item_id, deploy_id));
                        if let Ok(Some(reason)) = failure.await {
                            warn!(item_id, deploy_id, %reason, ticks, "deploy failed on chain");
                            return Outcome::Rejected { reason };
                        }
                    }
                }
                Ok(Err(e)) => warn!(item_id, ticks, error = %e, "transient read error while polling"),
            }

            let next = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = sleep_until(next) => {}
            }
        }

        warn!(
            item_id,
            ticks,
            cancelled = self.cancel.is_cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "not confirmed before deadline"
        );
        Outcome::TimedOut
    }
}
