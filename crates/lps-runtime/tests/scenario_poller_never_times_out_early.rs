//! Scenario: Poller deadline is exact
//!
//! # Invariants under test
//!
//! 1. A value that never shows up yields `TimedOut` exactly at the deadline,
//!    not one tick before and not one tick after.
//! 2. A deadline that is not a multiple of the poll interval still ends at
//!    the deadline (the last sleep is shortened).
//! 3. Cancelling the run ends polling early with `TimedOut`.
//! 4. A slot taken over by a foreign namespace ends polling with
//!    `OwnershipConflict`.

use std::sync::Arc;
use std::time::Duration;

use lps_execution::{RchainTokenTerms, RegistryTarget};
use lps_ledger_paper::{PaperLedger, SlotRecord};
use lps_reconcile::StateComparator;
use lps_runtime::{CancellationToken, ConvergencePoller};
use lps_schemas::Outcome;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(15);

fn poller(ledger: &Arc<PaperLedger>, cancel: CancellationToken) -> ConvergencePoller<PaperLedger> {
    let terms = RchainTokenTerms::new(RegistryTarget::new("rho:id:abcmaster", "names", "abc1"));
    let comparator = StateComparator::new(Arc::clone(ledger), Arc::new(terms), 1000);
    ConvergencePoller::new(comparator, INTERVAL, cancel)
}

#[tokio::test(start_paused = true)]
async fn absent_value_times_out_exactly_at_deadline() {
    let ledger = Arc::new(PaperLedger::new());
    let p = poller(&ledger, CancellationToken::new());
    let deadline = Duration::from_secs(120);
    let started = Instant::now();

    let got = p.poll_slot("example", "v1", None, started + deadline).await;

    assert_eq!(got, Outcome::TimedOut);
    assert_eq!(started.elapsed(), deadline);
    // Reads at 0, 15, ..., 105.
    assert_eq!(ledger.read_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn uneven_deadline_is_not_overshot() {
    let ledger = Arc::new(PaperLedger::new());
    ledger.seed_slot("example", SlotRecord::new("abc1", "v0"));
    let p = poller(&ledger, CancellationToken::new());
    let deadline = Duration::from_secs(40);
    let started = Instant::now();

    let got = p.poll_slot("example", "v1", None, started + deadline).await;

    assert_eq!(got, Outcome::TimedOut);
    assert_eq!(started.elapsed(), deadline);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_polling_early() {
    let ledger = Arc::new(PaperLedger::new());
    let cancel = CancellationToken::new();
    let p = poller(&ledger, cancel.clone());
    let started = Instant::now();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(20)).await;
        trigger.cancel();
    });

    let got = p
        .poll_slot("example", "v1", None, started + Duration::from_secs(600))
        .await;

    assert_eq!(got, Outcome::TimedOut);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn foreign_owner_is_a_conflict() {
    let ledger = Arc::new(PaperLedger::new());
    ledger.seed_slot("example", SlotRecord::new("abc777", "theirs"));
    let p = poller(&ledger, CancellationToken::new());

    let got = p
        .poll_slot("example", "v1", None, Instant::now() + Duration::from_secs(600))
        .await;

    assert_eq!(
        got,
        Outcome::OwnershipConflict {
            owner: "abc777".into()
        }
    );
}
