//! Scenario: Poller confirms on the first read that shows the value
//!
//! # Invariants under test
//!
//! 1. With the value absent for the first N reads, the poller returns
//!    `Confirmed` on read N+1 and issues no further reads.
//! 2. Reads are spaced one poll interval apart, so confirmation lands at
//!    N * interval after the first read.
//! 3. A visible value that differs from the submitted one while the slot is
//!    still ours keeps the poller waiting; it is not a conflict.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lps_execution::{
    LedgerError, LedgerGateway, RchainTokenTerms, ReadRequest, RegistryTarget, SignedEnvelope,
    SubmitReceipt,
};
use lps_reconcile::StateComparator;
use lps_runtime::{CancellationToken, ConvergencePoller};
use lps_schemas::rho::{data_at_name_response, expr_response, RhoValue};
use lps_schemas::{Outcome, TermOp};
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Read-back script: `before` for the first `switch_after` data reads, then
// `after` forever.
// ---------------------------------------------------------------------------

struct ReadBack {
    reads: AtomicU32,
    switch_after: u32,
    before: Option<&'static str>,
    after: &'static str,
}

impl ReadBack {
    fn new(switch_after: u32, before: Option<&'static str>, after: &'static str) -> Self {
        Self {
            reads: AtomicU32::new(0),
            switch_after,
            before,
            after,
        }
    }

    fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LedgerGateway for ReadBack {
    fn gateway_name(&self) -> &'static str {
        "read-back"
    }

    async fn submit(&self, env: &SignedEnvelope) -> Result<SubmitReceipt, LedgerError> {
        Ok(SubmitReceipt {
            deploy_id: env.deploy_id().to_string(),
        })
    }

    async fn propose_block(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn read_state(&self, req: &ReadRequest) -> Result<String, LedgerError> {
        let value = match &req.term.op {
            TermOp::ReadSlotData { .. } => {
                let n = self.reads.fetch_add(1, Ordering::SeqCst);
                match (n < self.switch_after, self.before) {
                    (true, None) => RhoValue::map(Vec::<(String, RhoValue)>::new()),
                    (true, Some(v)) => RhoValue::map([("example", RhoValue::str(v))]),
                    (false, _) => RhoValue::map([("example", RhoValue::str(self.after))]),
                }
            }
            TermOp::ReadSlots { .. } => RhoValue::map([(
                "example",
                RhoValue::map([
                    ("id", RhoValue::str("example")),
                    ("boxId", RhoValue::str("abc1")),
                ]),
            )]),
            _ => return Err(LedgerError::Rejected("unexpected read".into())),
        };
        Ok(expr_response(&[value]).to_string())
    }

    async fn read_deploy_result(
        &self,
        _deploy_id: &str,
        _depth: u32,
    ) -> Result<String, LedgerError> {
        Ok(data_at_name_response(&[]).to_string())
    }
}

fn poller(gw: &Arc<ReadBack>) -> ConvergencePoller<ReadBack> {
    let terms = RchainTokenTerms::new(RegistryTarget::new("rho:id:abcmaster", "names", "abc1"));
    let comparator = StateComparator::new(Arc::clone(gw), Arc::new(terms), 1000);
    ConvergencePoller::new(comparator, INTERVAL, CancellationToken::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn confirms_on_read_n_plus_one() {
    for n in [0u32, 1, 4] {
        let gw = Arc::new(ReadBack::new(n, None, "v1"));
        let p = poller(&gw);
        let started = Instant::now();

        let got = p
            .poll_slot("example", "v1", None, started + Duration::from_secs(600))
            .await;

        assert_eq!(got, Outcome::Confirmed, "n = {n}");
        assert_eq!(gw.reads(), n + 1, "n = {n}");
        assert_eq!(started.elapsed(), INTERVAL * n, "n = {n}");
    }
}

#[tokio::test(start_paused = true)]
async fn stale_value_in_own_slot_keeps_polling() {
    let gw = Arc::new(ReadBack::new(3, Some("v0"), "v1"));
    let p = poller(&gw);

    let got = p
        .poll_slot("example", "v1", None, Instant::now() + Duration::from_secs(600))
        .await;

    assert_eq!(got, Outcome::Confirmed);
    assert_eq!(gw.reads(), 4);
}
