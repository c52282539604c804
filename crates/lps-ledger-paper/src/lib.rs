//! Deterministic in-memory "paper" ledger.
//!
//! Models the parts of the registry contract the engine relies on:
//! namespaces (boxes) with a public key, slots (purses) with an owner, data
//! and optional price, and delayed visibility of accepted deploys.
//!
//! Visibility model:
//! - an accepted deploy sits in a pending pool,
//! - when `requires_propose` is set it stays there until `propose_block`,
//! - it is then executed at the start of the first read that comes at least
//!   `visible_after_reads` reads after it was accepted.
//!
//! Execution follows the contract's rules: a slot can only be created in an
//! existing namespace, with enough credit, and only once; only the owning
//! namespace's key can update it. A failing deploy leaves state untouched
//! and is recorded in `failed_deploys`. Either way the result is readable on
//! the deploy's own name through `read_deploy_result`; that read never
//! settles pending deploys and does not count as a state read.
//!
//! Re-submitting an already accepted deploy (same signature) is idempotent.
//! No randomness. No wall clock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lps_execution::{LedgerError, LedgerGateway, ReadRequest, SignedEnvelope, SubmitReceipt};
use lps_schemas::rho::{data_at_name_response, expr_response, RhoValue};
use lps_schemas::TermOp;
use tracing::debug;

pub mod types;

pub use types::{FailedDeploy, LedgerCall, NamespaceRecord, SlotRecord};

/// Owner recorded on the template slot seeded by [`PaperLedger::set_template_price`].
pub const TEMPLATE_OWNER: &str = "master";

const BOX_NOT_FOUND: &str = "error: box not found";
const OUT_OF_BUDGET: &str = "Error: out of phlogistons";

#[derive(Clone, Debug)]
struct Pending {
    deploy_id: String,
    deployer: String,
    op: TermOp,
    proposed: bool,
    reads_seen: u32,
}

#[derive(Clone, Debug, Default)]
struct Knobs {
    requires_propose: bool,
    visible_after_reads: u32,
    fail_propose: bool,
    propose_delay: Option<Duration>,
    min_execution_limit: u64,
    reject_slots: BTreeSet<String>,
    transient_submit_failures: u32,
    transient_read_failures: u32,
    budget_exhausted_reads: u32,
    preempt: BTreeMap<String, SlotRecord>,
}

#[derive(Debug, Default)]
struct PaperState {
    namespaces: BTreeMap<String, NamespaceRecord>,
    slots: BTreeMap<String, SlotRecord>,
    pending: Vec<Pending>,
    accepted: BTreeSet<String>,
    completed: BTreeSet<String>,
    failed: Vec<FailedDeploy>,
    calls: Vec<LedgerCall>,
    knobs: Knobs,
}

#[derive(Debug, Default)]
pub struct PaperLedger {
    state: Mutex<PaperState>,
}

impl PaperLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        // A panicking test thread must not wedge every other assertion.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // --- seeding -----------------------------------------------------------

    pub fn seed_namespace(&self, id: impl Into<String>, public_key: impl Into<String>) {
        self.lock().namespaces.insert(
            id.into(),
            NamespaceRecord {
                public_key: public_key.into(),
            },
        );
    }

    pub fn seed_slot(&self, id: impl Into<String>, record: SlotRecord) {
        self.lock().slots.insert(id.into(), record);
    }

    /// Seed the template slot `"0"` whose price is the mint credit.
    pub fn set_template_price(&self, price: u64) {
        let mut record = SlotRecord::new(TEMPLATE_OWNER, "");
        record.price = Some(price);
        self.seed_slot("0", record);
    }

    // --- knobs -------------------------------------------------------------

    pub fn set_requires_propose(&self, on: bool) {
        self.lock().knobs.requires_propose = on;
    }

    /// Number of reads that still see the old state after a deploy is
    /// accepted (and proposed, when proposals are required).
    pub fn set_visible_after_reads(&self, reads: u32) {
        self.lock().knobs.visible_after_reads = reads;
    }

    pub fn set_fail_propose(&self, on: bool) {
        self.lock().knobs.fail_propose = on;
    }

    pub fn set_propose_delay(&self, delay: Duration) {
        self.lock().knobs.propose_delay = Some(delay);
    }

    /// Deploys with a lower execution limit are rejected at submit.
    pub fn set_min_execution_limit(&self, limit: u64) {
        self.lock().knobs.min_execution_limit = limit;
    }

    /// Reject every write deploy targeting `slot_id`.
    pub fn reject_writes_to(&self, slot_id: impl Into<String>) {
        self.lock().knobs.reject_slots.insert(slot_id.into());
    }

    pub fn fail_next_submits(&self, n: u32) {
        self.lock().knobs.transient_submit_failures = n;
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.lock().knobs.transient_read_failures = n;
    }

    pub fn exhaust_budget_on_next_reads(&self, n: u32) {
        self.lock().knobs.budget_exhausted_reads = n;
    }

    /// A competing writer lands `record` in `slot_id` the moment our own
    /// write for that slot is submitted.
    pub fn preempt_on_submit(&self, slot_id: impl Into<String>, record: SlotRecord) {
        self.lock().knobs.preempt.insert(slot_id.into(), record);
    }

    // --- inspection --------------------------------------------------------

    pub fn calls(&self) -> Vec<LedgerCall> {
        self.lock().calls.clone()
    }

    pub fn submits(&self) -> Vec<LedgerCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_submit())
            .cloned()
            .collect()
    }

    pub fn submit_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_submit()).count()
    }

    pub fn read_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_read()).count()
    }

    /// Reads issued after the most recent submit.
    pub fn reads_after_last_submit(&self) -> usize {
        let st = self.lock();
        st.calls
            .iter()
            .rev()
            .take_while(|c| !c.is_submit())
            .filter(|c| c.is_read())
            .count()
    }

    pub fn slot(&self, id: &str) -> Option<SlotRecord> {
        self.lock().slots.get(id).cloned()
    }

    pub fn namespace(&self, id: &str) -> Option<NamespaceRecord> {
        self.lock().namespaces.get(id).cloned()
    }

    pub fn failed_deploys(&self) -> Vec<FailedDeploy> {
        self.lock().failed.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }
}

fn write_target(op: &TermOp) -> Option<String> {
    match op {
        TermOp::CreateNamespace { namespace_id, .. } => Some(namespace_id.clone()),
        TermOp::CreateSlot { slot_id, .. } | TermOp::UpdateSlotData { slot_id, .. } => {
            Some(slot_id.clone())
        }
        _ => None,
    }
}

impl PaperState {
    /// Execute every pending deploy that has become visible.
    fn settle(&mut self) {
        let requires_propose = self.knobs.requires_propose;
        let threshold = self.knobs.visible_after_reads;
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| (p.proposed || !requires_propose) && p.reads_seen >= threshold);
        self.pending = waiting;
        for p in ready {
            match self.execute(&p) {
                Ok(()) => {
                    self.completed.insert(p.deploy_id);
                }
                Err(reason) => {
                    debug!(deploy_id = %p.deploy_id, %reason, "paper deploy failed");
                    self.failed.push(FailedDeploy {
                        deploy_id: p.deploy_id,
                        reason,
                    });
                }
            }
        }
    }

    fn execute(&mut self, p: &Pending) -> Result<(), String> {
        match &p.op {
            TermOp::CreateNamespace {
                namespace_id,
                public_key,
            } => {
                if self.namespaces.contains_key(namespace_id) {
                    return Err(format!("box {namespace_id} already exists"));
                }
                self.namespaces.insert(
                    namespace_id.clone(),
                    NamespaceRecord {
                        public_key: public_key.clone(),
                    },
                );
                Ok(())
            }
            TermOp::CreateSlot {
                namespace_id,
                slot_id,
                data,
                credit,
                ..
            } => {
                self.owned_namespace(namespace_id, &p.deployer)?;
                if self.slots.contains_key(slot_id) {
                    return Err(format!("purse {slot_id} already exists"));
                }
                let price = self.slots.get("0").and_then(|t| t.price).unwrap_or(0);
                if credit.unwrap_or(0) < price {
                    return Err(format!("insufficient credit, price is {price}"));
                }
                self.slots
                    .insert(slot_id.clone(), SlotRecord::new(namespace_id.clone(), data.clone()));
                Ok(())
            }
            TermOp::UpdateSlotData {
                namespace_id,
                slot_id,
                data,
                ..
            } => {
                self.owned_namespace(namespace_id, &p.deployer)?;
                let slot = self
                    .slots
                    .get_mut(slot_id)
                    .ok_or_else(|| format!("purse {slot_id} not found"))?;
                if &slot.owner != namespace_id {
                    return Err(format!("purse {slot_id} is owned by {}", slot.owner));
                }
                slot.data = data.clone();
                Ok(())
            }
            other => Err(format!("{} is not a write", other.name())),
        }
    }

    fn owned_namespace(&self, namespace_id: &str, deployer: &str) -> Result<(), String> {
        let ns = self
            .namespaces
            .get(namespace_id)
            .ok_or_else(|| format!("box {namespace_id} not found"))?;
        if ns.public_key != deployer {
            return Err(format!("box {namespace_id} belongs to another key"));
        }
        Ok(())
    }

    fn answer(&self, op: &TermOp) -> Result<RhoValue, LedgerError> {
        match op {
            TermOp::ReadNamespace { namespace_id } => Ok(match self.namespaces.get(namespace_id) {
                None => RhoValue::str(BOX_NOT_FOUND),
                Some(ns) => {
                    let owned: Vec<RhoValue> = self
                        .slots
                        .iter()
                        .filter(|(_, s)| &s.owner == namespace_id)
                        .map(|(id, _)| RhoValue::str(id.as_str()))
                        .collect();
                    RhoValue::map([
                        ("publicKey", RhoValue::str(ns.public_key.as_str())),
                        ("purses", RhoValue::Set(owned)),
                    ])
                }
            }),
            TermOp::ReadSlots { slot_ids, .. } => Ok(RhoValue::map(
                slot_ids
                    .iter()
                    .filter_map(|id| self.slots.get(id).map(|s| (id, s)))
                    .map(|(id, s)| {
                        let mut fields = vec![
                            ("id", RhoValue::str(id.as_str())),
                            ("boxId", RhoValue::str(s.owner.as_str())),
                        ];
                        if let Some(p) = s.price {
                            fields.push((
                                "price",
                                RhoValue::Tuple(vec![RhoValue::str("rev"), RhoValue::Int(p as i64)]),
                            ));
                        }
                        (id.clone(), RhoValue::map(fields))
                    }),
            )),
            TermOp::ReadSlotData { slot_ids, .. } => Ok(RhoValue::map(
                slot_ids
                    .iter()
                    .filter_map(|id| {
                        self.slots
                            .get(id)
                            .map(|s| (id.clone(), RhoValue::str(s.data.as_str())))
                    }),
            )),
            other => Err(LedgerError::Rejected(format!(
                "{} is not a read-only query",
                other.name()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl LedgerGateway for PaperLedger {
    fn gateway_name(&self) -> &'static str {
        "paper"
    }

    async fn submit(&self, env: &SignedEnvelope) -> Result<SubmitReceipt, LedgerError> {
        let mut st = self.lock();
        let deploy_id = env.deploy_id().to_string();
        let target = write_target(&env.op).unwrap_or_default();
        st.calls.push(LedgerCall::Submit {
            op: env.op.name(),
            target: target.clone(),
            deploy_id: deploy_id.clone(),
        });

        if st.knobs.transient_submit_failures > 0 {
            st.knobs.transient_submit_failures -= 1;
            return Err(LedgerError::Transport("paper: connection reset".into()));
        }
        if st.accepted.contains(&deploy_id) {
            return Ok(SubmitReceipt { deploy_id });
        }
        if !env.op.is_write() {
            return Err(LedgerError::Rejected(format!(
                "{} is not a deployable write",
                env.op.name()
            )));
        }
        env.verify()
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;
        if env.data.phlo_limit < st.knobs.min_execution_limit {
            return Err(LedgerError::Rejected(format!(
                "insufficient execution budget: limit {} < {}",
                env.data.phlo_limit, st.knobs.min_execution_limit
            )));
        }
        if st.knobs.reject_slots.contains(&target) {
            return Err(LedgerError::Rejected(format!("paper: writes to {target} refused")));
        }

        if let Some(winner) = st.knobs.preempt.remove(&target) {
            st.slots.insert(target.clone(), winner);
        }

        st.accepted.insert(deploy_id.clone());
        st.pending.push(Pending {
            deploy_id: deploy_id.clone(),
            deployer: env.deployer.clone(),
            op: env.op.clone(),
            proposed: false,
            reads_seen: 0,
        });
        debug!(%deploy_id, target, "paper deploy accepted");
        Ok(SubmitReceipt { deploy_id })
    }

    async fn propose_block(&self) -> Result<(), LedgerError> {
        let delay = {
            let mut st = self.lock();
            st.calls.push(LedgerCall::Propose);
            st.knobs.propose_delay
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let mut st = self.lock();
        if st.knobs.fail_propose {
            return Err(LedgerError::Transport("paper: propose refused".into()));
        }
        for p in st.pending.iter_mut() {
            p.proposed = true;
        }
        Ok(())
    }

    async fn read_state(&self, req: &ReadRequest) -> Result<String, LedgerError> {
        let mut st = self.lock();
        let ids = match &req.term.op {
            TermOp::ReadNamespace { namespace_id } => vec![namespace_id.clone()],
            TermOp::ReadSlots { slot_ids, .. } | TermOp::ReadSlotData { slot_ids, .. } => {
                slot_ids.clone()
            }
            _ => Vec::new(),
        };
        st.calls.push(LedgerCall::Read {
            op: req.term.op.name(),
            ids,
        });

        st.settle();
        let requires_propose = st.knobs.requires_propose;
        for p in st.pending.iter_mut() {
            if p.proposed || !requires_propose {
                p.reads_seen += 1;
            }
        }

        if st.knobs.transient_read_failures > 0 {
            st.knobs.transient_read_failures -= 1;
            return Err(LedgerError::Transport("paper: read timed out".into()));
        }
        if st.knobs.budget_exhausted_reads > 0 {
            st.knobs.budget_exhausted_reads -= 1;
            return Ok(OUT_OF_BUDGET.to_string());
        }

        let value = st.answer(&req.term.op)?;
        Ok(expr_response(&[value]).to_string())
    }

    async fn read_deploy_result(
        &self,
        deploy_id: &str,
        _depth: u32,
    ) -> Result<String, LedgerError> {
        let mut st = self.lock();
        st.calls.push(LedgerCall::DeployResult {
            deploy_id: deploy_id.to_string(),
        });

        let result = if st.completed.contains(deploy_id) {
            Some(RhoValue::map([("status", RhoValue::str("completed"))]))
        } else {
            st.failed.iter().find(|f| f.deploy_id == deploy_id).map(|f| {
                RhoValue::map([
                    ("status", RhoValue::str("failed")),
                    ("message", RhoValue::str(format!("error: {}", f.reason))),
                ])
            })
        };
        Ok(data_at_name_response(result.as_slice()).to_string())
    }
}
