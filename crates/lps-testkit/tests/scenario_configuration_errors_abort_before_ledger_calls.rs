//! Scenario: Configuration errors abort the run before any ledger call
//!
//! # Invariants under test
//!
//! 1. A namespace id that does not share the master registry prefix aborts
//!    with no ledger traffic at all.
//! 2. Missing registry identifiers abort with no ledger traffic.
//! 3. Two items with the same id abort with no ledger traffic.
//! 4. A namespace registered to another key aborts the run before any
//!    submit.

use lps_execution::{RegistryTarget, Signer};
use lps_runtime::{CancellationToken, ConfigurationError};
use lps_schemas::Item;
use lps_testkit::{foreign_signer, Harness, MASTER_REGISTRY_URI, NAMESPACE_ID};

#[tokio::test(start_paused = true)]
async fn namespace_prefix_mismatch_is_fatal() {
    let h = Harness::new();
    let target = RegistryTarget::new("rho:id:xyzmaster", "names", NAMESPACE_ID);

    let err = h
        .reconciler_for(target, CancellationToken::new())
        .reconcile(&[Item::purse("example", "v1")])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConfigurationError::NamespacePrefixMismatch {
            namespace_id: NAMESPACE_ID.into(),
            expected_prefix: "xyz".into(),
        }
    );
    assert!(h.ledger.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_contract_id_is_fatal() {
    let h = Harness::new();
    let target = RegistryTarget::new(MASTER_REGISTRY_URI, "", NAMESPACE_ID);

    let err = h
        .reconciler_for(target, CancellationToken::new())
        .check(&[Item::purse("example", "v1")])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConfigurationError::MissingIdentifier("registry.contract_id")
    );
    assert!(h.ledger.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_item_ids_are_fatal() {
    let h = Harness::new();

    let err = h
        .reconciler()
        .reconcile(&[Item::purse("example", "v1"), Item::purse("example", "v2")])
        .await
        .unwrap_err();

    assert_eq!(err, ConfigurationError::DuplicateItemId("example".into()));
    assert!(h.ledger.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn namespace_owned_by_other_key_is_fatal() {
    let h = Harness::without_namespace();
    let other = foreign_signer().owner_identity();
    h.ledger.seed_namespace(NAMESPACE_ID, other.clone());

    let err = h
        .reconciler()
        .reconcile(&[Item::purse("example", "v1")])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConfigurationError::NamespaceKeyMismatch {
            namespace_id: NAMESPACE_ID.into(),
            recorded: other,
            signer: h.owner_key(),
        }
    );
    assert_eq!(h.ledger.submit_count(), 0);
}
