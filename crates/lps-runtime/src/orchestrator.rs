//! Reconciliation orchestrator.
//!
//! `reconcile(items)`:
//! 1. validate identifiers, policy and item ids (ConfigurationError aborts);
//!    malformed items are not ids and are keyed by position instead
//! 2. compare every item; transient read errors retried on the poll
//!    interval up to the write deadline
//! 3. partition: UpToDate / OwnedByOther / Invalid are terminal at once
//! 4. for the rest: check the namespace, plan its creation if missing, read
//!    the mint credit if anything is created
//! 5. deploy + confirm prerequisites, then the writes that depend on them
//! 6. one `ItemReport` per item; a failed item never stops its siblings

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use lps_execution::{
    DeployError, DeployExecutor, ExecutorConfig, LedgerGateway, Signer, TermBuilder,
};
use lps_reconcile::{NamespaceState, ReadError, StateComparator};
use lps_schemas::{Classification, Item, Outcome, Term};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::plan::{Plan, Prerequisite, WriteStep};
use crate::poller::ConvergencePoller;
use crate::policy::RunPolicy;
use crate::report::{CheckEntry, CheckReport, ItemReport, Report};

/// Characters of the master registry id a namespace id must start with.
const NAMESPACE_PREFIX_LEN: usize = 3;

/// One submit + propose + poll cycle. Lives from the submit until the
/// attempt's outcome is known.
#[derive(Debug, Clone)]
pub struct DeploymentAttempt {
    pub label: String,
    pub term: Term,
    pub deadline: Instant,
    pub poll_interval: Duration,
    /// Set once the ledger accepted the deploy.
    pub attempt_id: Option<Uuid>,
    pub submitted_at: Option<Instant>,
    pub deploy_id: Option<String>,
    /// Submit calls made, transport retries included.
    pub submits: u32,
}

impl DeploymentAttempt {
    fn new(label: String, term: Term, deadline: Instant, poll_interval: Duration) -> Self {
        Self {
            label,
            term,
            deadline,
            poll_interval,
            attempt_id: None,
            submitted_at: None,
            deploy_id: None,
            submits: 0,
        }
    }

    fn log_finished(&self, outcome: &Outcome) {
        debug!(
            label = %self.label,
            attempt_id = ?self.attempt_id,
            deploy_id = ?self.deploy_id,
            submits = self.submits,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            since_submit_ms = self.submitted_at.map(|t| t.elapsed().as_millis() as u64),
            outcome = outcome.as_str(),
            "attempt finished"
        );
    }
}

pub struct Reconciler<G> {
    comparator: StateComparator<G>,
    /// `None` for read-only reconcilers, which can only `check`.
    executor: Option<DeployExecutor<G>>,
    poller: ConvergencePoller<G>,
    terms: Arc<dyn TermBuilder>,
    policy: RunPolicy,
    cancel: CancellationToken,
}

impl<G> Reconciler<G>
where
    G: LedgerGateway + 'static,
{
    pub fn new(
        gateway: Arc<G>,
        terms: Arc<dyn TermBuilder>,
        signer: Arc<dyn Signer>,
        executor_cfg: ExecutorConfig,
        policy: RunPolicy,
    ) -> Self {
        Self::with_cancellation(
            gateway,
            terms,
            signer,
            executor_cfg,
            policy,
            CancellationToken::new(),
        )
    }

    /// Cancelling `cancel` ends every polling loop early with `TimedOut`.
    pub fn with_cancellation(
        gateway: Arc<G>,
        terms: Arc<dyn TermBuilder>,
        signer: Arc<dyn Signer>,
        executor_cfg: ExecutorConfig,
        policy: RunPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let comparator =
            StateComparator::new(Arc::clone(&gateway), Arc::clone(&terms), policy.read_depth);
        let poller =
            ConvergencePoller::new(comparator.clone(), policy.poll_interval, cancel.clone());
        let executor = DeployExecutor::new(gateway, signer, executor_cfg);
        Self {
            comparator,
            executor: Some(executor),
            poller,
            terms,
            policy,
            cancel,
        }
    }

    /// A reconciler without a signing key. `reconcile` fails with
    /// `MissingSigner`; `check` works as usual.
    pub fn read_only(gateway: Arc<G>, terms: Arc<dyn TermBuilder>, policy: RunPolicy) -> Self {
        let cancel = CancellationToken::new();
        let comparator = StateComparator::new(gateway, Arc::clone(&terms), policy.read_depth);
        let poller =
            ConvergencePoller::new(comparator.clone(), policy.poll_interval, cancel.clone());
        Self {
            comparator,
            executor: None,
            poller,
            terms,
            policy,
            cancel,
        }
    }

    /// Everything checked here is fatal and checked before any ledger call.
    pub fn validate(&self, items: &[Item]) -> Result<(), ConfigurationError> {
        let target = self.terms.target();
        if target.master_id().trim().is_empty() {
            return Err(ConfigurationError::MissingIdentifier(
                "registry.master_registry_uri",
            ));
        }
        if target.contract_id.trim().is_empty() {
            return Err(ConfigurationError::MissingIdentifier("registry.contract_id"));
        }
        if target.namespace_id.trim().is_empty() {
            return Err(ConfigurationError::MissingIdentifier("registry.box_id"));
        }
        let prefix: String = target.master_id().chars().take(NAMESPACE_PREFIX_LEN).collect();
        if !target.namespace_id.starts_with(&prefix) {
            return Err(ConfigurationError::NamespacePrefixMismatch {
                namespace_id: target.namespace_id.clone(),
                expected_prefix: prefix,
            });
        }

        if self.policy.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidPolicy(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.policy.poll_interval.is_zero() {
            return Err(ConfigurationError::InvalidPolicy(
                "poll_interval must be positive".into(),
            ));
        }

        // Malformed items are reported, not written, so their ids can clash.
        let mut seen = BTreeSet::new();
        for item in items.iter().filter(|i| i.validate().is_ok()) {
            if !seen.insert(item.id.as_str()) {
                return Err(ConfigurationError::DuplicateItemId(item.id.clone()));
            }
        }
        Ok(())
    }

    /// Retry `read` on the poll interval until it succeeds or `deadline`.
    async fn read_with_retry<T, F, Fut>(
        &self,
        what: &str,
        deadline: Instant,
        mut read: F,
    ) -> Result<T, ReadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReadError>>,
    {
        loop {
            match read().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let next = Instant::now() + self.policy.poll_interval;
                    if next >= deadline || self.cancel.is_cancelled() {
                        warn!(what, error = %e, "giving up on read");
                        return Err(e);
                    }
                    warn!(what, error = %e, "read failed, retrying");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(e),
                        _ = sleep_until(next) => {}
                    }
                }
            }
        }
    }

    async fn compare_all(
        &self,
        items: &[Item],
        deadline: Instant,
    ) -> Vec<(Item, Result<Classification, ReadError>)> {
        stream::iter(items.iter().cloned())
            .map(|item| async move {
                let item_ref = &item;
                let c = self
                    .read_with_retry(&item.id, deadline, move || {
                        self.comparator.compare(item_ref)
                    })
                    .await;
                (item, c)
            })
            .buffered(self.policy.max_concurrency)
            .collect()
            .await
    }

    /// Check-only mode: classify everything, write nothing.
    pub async fn check(&self, items: &[Item]) -> Result<CheckReport, ConfigurationError> {
        self.validate(items)?;
        let items = keyed_items(items);
        let deadline = Instant::now() + self.policy.write_deadline;

        let mut report = CheckReport::default();
        for (item, res) in self.compare_all(&items, deadline).await {
            let (classification, error) = match res {
                Ok(c) => (Some(c), None),
                Err(e) => (None, Some(e.to_string())),
            };
            report.insert(CheckEntry {
                id: item.id.clone(),
                origin: item.origin.clone(),
                classification,
                error,
            });
        }
        Ok(report)
    }

    pub async fn reconcile(&self, items: &[Item]) -> Result<Report, ConfigurationError> {
        self.validate(items)?;
        let executor = self
            .executor
            .as_ref()
            .ok_or(ConfigurationError::MissingSigner)?;
        let items = keyed_items(items);
        let started = Instant::now();
        let compare_deadline = started + self.policy.write_deadline;
        let mut report = Report::new();

        // -- compare + partition ------------------------------------------
        let mut needing_write = Vec::new();
        for (item, res) in self.compare_all(&items, compare_deadline).await {
            let entry = match res {
                Ok(c) => match settled_outcome(&c) {
                    Some(outcome) => ItemReport::new(&item, Some(c), outcome),
                    None => {
                        needing_write.push((item, c));
                        continue;
                    }
                },
                Err(_) => ItemReport::new(&item, None, Outcome::TimedOut),
            };
            log_terminal(&entry);
            report.insert(entry);
        }

        if needing_write.is_empty() {
            info!(summary = %report.summary(), "nothing to deploy");
            return Ok(report);
        }

        // -- prerequisites ------------------------------------------------
        let bootstrap_deadline = Instant::now() + self.policy.bootstrap_deadline;
        let namespace = self
            .read_with_retry("namespace", bootstrap_deadline, move || {
                self.comparator.read_namespace()
            })
            .await;
        let signer_key = executor.owner_identity();
        let missing = match namespace {
            Err(e) => {
                warn!(error = %e, "namespace unreadable, dependent writes not attempted");
                for (item, c) in needing_write {
                    let entry = ItemReport::new(&item, Some(c), Outcome::TimedOut);
                    log_terminal(&entry);
                    report.insert(entry);
                }
                return Ok(report);
            }
            Ok(NamespaceState::Present {
                public_key: Some(recorded),
            }) if recorded != signer_key => {
                return Err(ConfigurationError::NamespaceKeyMismatch {
                    namespace_id: self.comparator.own_namespace().to_string(),
                    recorded,
                    signer: signer_key,
                });
            }
            Ok(NamespaceState::Present { .. }) => None,
            Ok(NamespaceState::Absent) => {
                info!(namespace_id = %self.comparator.own_namespace(), "namespace not found, will create it first");
                Some(Prerequisite::Namespace {
                    namespace_id: self.comparator.own_namespace().to_string(),
                    public_key: signer_key,
                })
            }
        };

        let credit = if needing_write
            .iter()
            .any(|(_, c)| *c == Classification::NeedsCreate)
        {
            match self
                .read_with_retry("template price", compare_deadline, move || {
                    self.comparator.template_price()
                })
                .await
            {
                Ok(price) => price,
                Err(e) => {
                    warn!(error = %e, "mint price unreadable, creates not attempted");
                    let (creates, rest): (Vec<_>, Vec<_>) = needing_write
                        .into_iter()
                        .partition(|(_, c)| *c == Classification::NeedsCreate);
                    for (item, c) in creates {
                        let entry = ItemReport::new(&item, Some(c), Outcome::TimedOut);
                        log_terminal(&entry);
                        report.insert(entry);
                    }
                    needing_write = rest;
                    None
                }
            }
        } else {
            None
        };

        let plan = Plan::build(needing_write, missing, credit);
        debug!(
            prerequisites = plan.prerequisites.len(),
            writes = plan.writes.len(),
            "plan built"
        );

        let mut failed_prereqs: BTreeMap<usize, Outcome> = BTreeMap::new();
        for (idx, prereq) in plan.prerequisites.iter().enumerate() {
            let outcome = self.run_prerequisite(executor, prereq).await;
            if !outcome.is_success() {
                failed_prereqs.insert(idx, outcome);
            }
        }

        // -- writes -------------------------------------------------------
        for (&idx, prereq_outcome) in &failed_prereqs {
            for step in plan.dependents(idx) {
                let outcome = match prereq_outcome {
                    Outcome::Rejected { reason } => Outcome::Rejected {
                        reason: format!(
                            "prerequisite {} rejected: {reason}",
                            plan.prerequisites[idx].label()
                        ),
                    },
                    _ => Outcome::TimedOut,
                };
                let entry = ItemReport::new(&step.item, Some(step.op.classification()), outcome);
                log_terminal(&entry);
                report.insert(entry);
            }
        }
        let runnable: Vec<&WriteStep> = plan
            .writes
            .iter()
            .filter(|w| w.requires.map_or(true, |idx| !failed_prereqs.contains_key(&idx)))
            .collect();

        let entries: Vec<ItemReport> = stream::iter(runnable)
            .map(|step| self.run_write(executor, step))
            .buffer_unordered(self.policy.max_concurrency)
            .collect()
            .await;
        for entry in entries {
            report.insert(entry);
        }

        info!(
            summary = %report.summary(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reconcile finished"
        );
        Ok(report)
    }

    async fn run_prerequisite(
        &self,
        executor: &DeployExecutor<G>,
        prereq: &Prerequisite,
    ) -> Outcome {
        let mut attempt = DeploymentAttempt::new(
            prereq.label(),
            prereq.term(self.terms.as_ref()),
            Instant::now() + self.policy.bootstrap_deadline,
            self.policy.poll_interval,
        );
        info!(prerequisite = %attempt.label, "deploying prerequisite");
        let outcome = match self.submit(executor, &mut attempt).await {
            Some(o) => o,
            None => {
                self.poller
                    .poll_namespace(attempt.deploy_id.as_deref(), attempt.deadline)
                    .await
            }
        };
        attempt.log_finished(&outcome);
        if outcome.is_success() {
            info!(prerequisite = %attempt.label, "prerequisite confirmed");
        } else {
            warn!(prerequisite = %attempt.label, outcome = %outcome, "prerequisite failed");
        }
        outcome
    }

    async fn run_write(&self, executor: &DeployExecutor<G>, step: &WriteStep) -> ItemReport {
        let item = &step.item;
        let mut attempt = DeploymentAttempt::new(
            item.id.clone(),
            step.term(self.terms.as_ref()),
            Instant::now() + self.policy.write_deadline,
            self.policy.poll_interval,
        );

        let outcome = match self.submit(executor, &mut attempt).await {
            Some(o) => o,
            None => {
                self.poller
                    .poll_slot(
                        &item.id,
                        &item.desired_value,
                        attempt.deploy_id.as_deref(),
                        attempt.deadline,
                    )
                    .await
            }
        };
        attempt.log_finished(&outcome);

        let mut entry = ItemReport::new(item, Some(step.op.classification()), outcome);
        entry.deploy_id = attempt.deploy_id;
        log_terminal(&entry);
        entry
    }

    /// Submit phase of an attempt. `Some(outcome)` when the attempt ended
    /// without reaching the polling phase.
    async fn submit(
        &self,
        executor: &DeployExecutor<G>,
        attempt: &mut DeploymentAttempt,
    ) -> Option<Outcome> {
        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Some(Outcome::TimedOut),
            r = executor.execute(&attempt.term, self.policy.budget, attempt.deadline) => r,
        };
        match res {
            Ok(receipt) => {
                attempt.attempt_id = Some(receipt.attempt_id);
                attempt.submitted_at = Some(receipt.submitted_at);
                attempt.deploy_id = Some(receipt.deploy_id);
                attempt.submits = receipt.submits;
                None
            }
            Err(DeployError::Rejected(reason)) => Some(Outcome::Rejected { reason }),
            Err(DeployError::TimedOut { submits, .. }) => {
                attempt.submits = submits;
                Some(Outcome::TimedOut)
            }
        }
    }
}

/// Items as they are keyed in reports. A malformed item whose id is empty or
/// already taken gets `#<position>` so it keeps an entry of its own.
fn keyed_items(items: &[Item]) -> Vec<Item> {
    let mut taken: BTreeSet<String> = items
        .iter()
        .filter(|i| i.validate().is_ok())
        .map(|i| i.id.clone())
        .collect();
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let Err(reason) = item.validate() else {
                return item.clone();
            };
            let mut keyed = item.clone();
            if keyed.id.trim().is_empty() || !taken.insert(keyed.id.clone()) {
                keyed.id = format!("#{idx}");
                keyed.defect = Some(reason);
            }
            keyed
        })
        .collect()
}

/// Outcome for classifications that need no write; `None` otherwise.
fn settled_outcome(c: &Classification) -> Option<Outcome> {
    match c {
        Classification::UpToDate => Some(Outcome::AlreadyCurrent),
        Classification::OwnedByOther { owner } => Some(Outcome::OwnershipConflict {
            owner: owner.clone(),
        }),
        Classification::Invalid { reason } => Some(Outcome::Invalid {
            reason: reason.clone(),
        }),
        Classification::NeedsCreate | Classification::NeedsUpdate => None,
    }
}

fn log_terminal(entry: &ItemReport) {
    if entry.outcome.is_success() {
        info!(item_id = %entry.id, outcome = entry.outcome.as_str(), "item done");
    } else {
        warn!(item_id = %entry.id, outcome = entry.outcome.as_str(), detail = %entry.outcome, "item not converged");
    }
}
