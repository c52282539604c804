//! Scenario: Namespace is created and confirmed before its slots
//!
//! # Invariants under test
//!
//! 1. On a ledger without our namespace, the first submit is the namespace
//!    creation, and a namespace read confirming it comes before the first
//!    slot creation.
//! 2. The namespace is registered to the signer's public key.
//! 3. Slot creation pays the template price as credit and is confirmed.
//! 4. A refused namespace creation fails every dependent item as
//!    `Rejected` without submitting any of them.

use lps_schemas::{Item, Outcome};
use lps_testkit::{Harness, LedgerCall, NAMESPACE_ID};

#[tokio::test(start_paused = true)]
async fn prerequisite_cycle_precedes_item_create() {
    let h = Harness::without_namespace();
    h.ledger.set_template_price(10);

    let report = h
        .reconciler()
        .reconcile(&[Item::purse("example", "v1"), Item::purse("other", "v2")])
        .await
        .unwrap();

    assert_eq!(report.outcome("example"), Some(&Outcome::Confirmed));
    assert_eq!(report.outcome("other"), Some(&Outcome::Confirmed));

    let submitted = h.submitted();
    assert_eq!(submitted[0], ("create_namespace", NAMESPACE_ID.to_string()));
    assert!(submitted[1..].iter().all(|(op, _)| *op == "create_slot"));

    let calls = h.ledger.calls();
    let ns_submit = calls
        .iter()
        .position(|c| matches!(c, LedgerCall::Submit { op: "create_namespace", .. }))
        .unwrap();
    let first_slot_submit = calls
        .iter()
        .position(|c| matches!(c, LedgerCall::Submit { op: "create_slot", .. }))
        .unwrap();
    let confirm_read = calls[ns_submit..]
        .iter()
        .position(|c| matches!(c, LedgerCall::Read { op: "read_namespace", .. }))
        .map(|i| i + ns_submit)
        .unwrap();
    assert!(ns_submit < confirm_read && confirm_read < first_slot_submit);

    assert_eq!(
        h.ledger.namespace(NAMESPACE_ID).unwrap().public_key,
        h.owner_key()
    );
    assert!(h.ledger.failed_deploys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refused_namespace_fails_dependents_without_submits() {
    let h = Harness::without_namespace();
    h.ledger.reject_writes_to(NAMESPACE_ID);

    let report = h
        .reconciler()
        .reconcile(&[Item::purse("example", "v1"), Item::purse("other", "v2")])
        .await
        .unwrap();

    for id in ["example", "other"] {
        match report.outcome(id) {
            Some(Outcome::Rejected { reason }) => {
                assert!(reason.contains("prerequisite namespace abc1"), "{reason}")
            }
            other => panic!("{id}: unexpected outcome {other:?}"),
        }
    }
    assert_eq!(h.submitted(), vec![("create_namespace", NAMESPACE_ID.to_string())]);
}
