//! Shared fixtures for scenario tests.
//!
//! Every scenario runs a real [`Reconciler`] against a [`PaperLedger`] with
//! a fixed signing key and a short, deterministic run policy. Tests drive
//! time with tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use lps_execution::{Ed25519Signer, ExecutorConfig, RchainTokenTerms, RegistryTarget, Signer};
use lps_ledger_paper::PaperLedger;
use lps_runtime::{CancellationToken, Reconciler, RunPolicy};
use serde_json::{json, Value};

pub use lps_ledger_paper::{LedgerCall, SlotRecord};

pub const MASTER_REGISTRY_URI: &str = "rho:id:abcmaster";
pub const CONTRACT_ID: &str = "names";
pub const NAMESPACE_ID: &str = "abc1";

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const WRITE_DEADLINE: Duration = Duration::from_secs(60);
pub const BOOTSTRAP_DEADLINE: Duration = Duration::from_secs(120);

const SIGNING_SEED: [u8; 32] = [7u8; 32];

pub fn test_signer() -> Arc<Ed25519Signer> {
    Arc::new(Ed25519Signer::from_bytes(&SIGNING_SEED))
}

/// A key that is not ours.
pub fn foreign_signer() -> Arc<Ed25519Signer> {
    Arc::new(Ed25519Signer::from_bytes(&[9u8; 32]))
}

pub fn test_target() -> RegistryTarget {
    RegistryTarget::new(MASTER_REGISTRY_URI, CONTRACT_ID, NAMESPACE_ID)
}

/// Production defaults with short timings.
pub fn fast_policy() -> RunPolicy {
    RunPolicy {
        poll_interval: POLL_INTERVAL,
        write_deadline: WRITE_DEADLINE,
        bootstrap_deadline: BOOTSTRAP_DEADLINE,
        ..RunPolicy::default()
    }
}

pub fn fast_executor_config() -> ExecutorConfig {
    ExecutorConfig {
        submit_timeout: Duration::from_secs(5),
        propose_timeout: Duration::from_secs(2),
        submit_retry_interval: Duration::from_secs(1),
        ..ExecutorConfig::default()
    }
}

/// Minimal zone declaration with one A record.
pub fn zone(origin: &str, ip: &str) -> Value {
    json!({
        "origin": origin,
        "ttl": 3600,
        "records": [{ "name": "@", "type": "A", "data": ip }]
    })
}

/// A paper ledger plus the identity that writes to it.
pub struct Harness {
    pub ledger: Arc<PaperLedger>,
    pub signer: Arc<Ed25519Signer>,
    pub policy: RunPolicy,
    pub executor: ExecutorConfig,
}

impl Harness {
    /// Our namespace already exists and is registered to [`test_signer`].
    pub fn new() -> Self {
        let h = Self::without_namespace();
        h.ledger.seed_namespace(NAMESPACE_ID, h.owner_key());
        h
    }

    /// Fresh ledger: the namespace has to be created first.
    pub fn without_namespace() -> Self {
        Self {
            ledger: Arc::new(PaperLedger::new()),
            signer: test_signer(),
            policy: fast_policy(),
            executor: fast_executor_config(),
        }
    }

    pub fn owner_key(&self) -> String {
        self.signer.owner_identity()
    }

    pub fn reconciler(&self) -> Reconciler<PaperLedger> {
        self.reconciler_with_cancel(CancellationToken::new())
    }

    pub fn reconciler_with_cancel(&self, cancel: CancellationToken) -> Reconciler<PaperLedger> {
        self.reconciler_for(test_target(), cancel)
    }

    pub fn reconciler_for(
        &self,
        target: RegistryTarget,
        cancel: CancellationToken,
    ) -> Reconciler<PaperLedger> {
        let signer: Arc<dyn Signer> = self.signer.clone();
        Reconciler::with_cancellation(
            Arc::clone(&self.ledger),
            Arc::new(RchainTokenTerms::new(target)),
            signer,
            self.executor.clone(),
            self.policy.clone(),
            cancel,
        )
    }

    /// No signing key: `check` works, `reconcile` refuses.
    pub fn read_only_reconciler(&self) -> Reconciler<PaperLedger> {
        Reconciler::read_only(
            Arc::clone(&self.ledger),
            Arc::new(RchainTokenTerms::new(test_target())),
            self.policy.clone(),
        )
    }

    /// Submit calls as `(op, target)` pairs, in order.
    pub fn submitted(&self) -> Vec<(&'static str, String)> {
        self.ledger
            .submits()
            .into_iter()
            .filter_map(|c| match c {
                LedgerCall::Submit { op, target, .. } => Some((op, target)),
                _ => None,
            })
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
