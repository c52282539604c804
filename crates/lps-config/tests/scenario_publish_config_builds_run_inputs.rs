//! Scenario: Publish config builds the run inputs
//!
//! # Invariants under test
//!
//! 1. Omitted sections take the documented defaults (15 s poll interval,
//!    8 min write deadline, 48 min bootstrap deadline, depth 1000, price 1,
//!    limit 100,000,000, sequential, lenient, propose after submit).
//! 2. Overrides flow into `RunPolicy` and `ExecutorConfig`.
//! 3. Zones become items keyed by their origin minus the network suffix,
//!    followed by purses in declaration order.
//! 4. A config with neither zones nor purses is an error.
//! 5. Unused keys are reported per mode and fail only under `Fail`.
//! 6. A zone's desired value is its JSON in the order the YAML declares it,
//!    including inside records.

use std::time::Duration;

use lps_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigMode, PublishConfig,
    UnusedKeyPolicy,
};
use lps_schemas::ItemKind;

const BASE: &str = r#"
ledger:
  read_only_url: "http://localhost:40403"
  validator_url: "http://localhost:40403"
registry:
  master_registry_uri: "rho:id:abcmaster"
  contract_id: "names"
  box_id: "abc1"
zones:
  - origin: "example.d"
    records:
      - { name: "@", type: "A", data: "127.0.0.1" }
purses:
  - id: "raw"
    data: "payload"
"#;

fn load(docs: &[&str]) -> PublishConfig {
    let loaded = load_layered_yaml_from_strings(docs).unwrap();
    PublishConfig::from_loaded(&loaded).unwrap()
}

#[test]
fn defaults_apply() {
    let cfg = load(&[BASE]);
    let policy = cfg.run_policy();
    assert_eq!(policy.poll_interval, Duration::from_secs(15));
    assert_eq!(policy.write_deadline, Duration::from_secs(8 * 60));
    assert_eq!(policy.bootstrap_deadline, Duration::from_secs(48 * 60));
    assert_eq!(policy.read_depth, 1000);
    assert_eq!(policy.budget.price, 1);
    assert_eq!(policy.budget.limit, 100_000_000);
    assert_eq!(policy.max_concurrency, 1);
    assert!(!policy.strict);

    let exec = cfg.executor_config();
    assert_eq!(exec.shard_id, "root");
    assert!(exec.propose_after_submit);
    assert_eq!(cfg.keys_env.private_key, "LPS_PRIVATE_KEY");
}

#[test]
fn overrides_flow_into_policy_and_executor() {
    let overlay = r#"
timing:
  poll_interval_ms: 2000
  write_deadline_ms: 60000
  submit_retry_interval_ms: 500
run:
  strict: true
  max_concurrency: 4
  propose_after_submit: false
budget:
  limit: 5000000
"#;
    let cfg = load(&[BASE, overlay]);
    let policy = cfg.run_policy();
    assert_eq!(policy.poll_interval, Duration::from_secs(2));
    assert_eq!(policy.write_deadline, Duration::from_secs(60));
    assert!(policy.strict);
    assert_eq!(policy.max_concurrency, 4);
    assert_eq!(policy.budget.limit, 5_000_000);
    assert_eq!(policy.budget.price, 1);

    let exec = cfg.executor_config();
    assert_eq!(exec.submit_retry_interval, Duration::from_millis(500));
    assert!(!exec.propose_after_submit);
}

#[test]
fn zones_then_purses_become_items() {
    let cfg = load(&[BASE]);
    let items = cfg.items().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "example");
    assert_eq!(items[0].origin, "example.d");
    assert_eq!(items[0].kind, ItemKind::Zone);
    assert!(items[0].validate().is_ok());
    assert_eq!(items[1].id, "raw");
    assert_eq!(items[1].desired_value, "payload");

    let target = cfg.registry_target();
    assert_eq!(target.master_id(), "abcmaster");
    assert_eq!(target.namespace_id, "abc1");
}

#[test]
fn zone_payload_keeps_yaml_key_order() {
    let cfg = load(&[r#"
ledger:
  read_only_url: "http://localhost:40403"
zones:
  - origin: "example.d"
    ttl: 3600
    records:
      - { name: "@", type: "A", data: "127.0.0.1" }
"#]);
    let items = cfg.items().unwrap();
    let json = String::from_utf8(hex::decode(&items[0].desired_value).unwrap()).unwrap();
    assert_eq!(
        json,
        r#"{"origin":"example.d","ttl":3600,"records":[{"name":"@","type":"A","data":"127.0.0.1"}]}"#
    );
}

#[test]
fn no_items_is_an_error() {
    let cfg = load(&[r#"
ledger:
  read_only_url: "http://localhost:40403"
"#]);
    let err = cfg.items().unwrap_err().to_string();
    assert!(err.contains("no zones or purses"), "{err}");
}

#[test]
fn unused_keys_are_mode_specific() {
    let extra = r#"
dashboard:
  theme: "dark"
"#;
    let loaded = load_layered_yaml_from_strings(&[BASE, extra]).unwrap();

    let push = report_unused_keys(ConfigMode::Push, &loaded.config_json, UnusedKeyPolicy::Warn)
        .unwrap();
    assert_eq!(push.unused_leaf_pointers, vec!["/dashboard/theme".to_string()]);

    let check =
        report_unused_keys(ConfigMode::Check, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(check
        .unused_leaf_pointers
        .contains(&"/ledger/validator_url".to_string()));

    assert!(
        report_unused_keys(ConfigMode::Push, &loaded.config_json, UnusedKeyPolicy::Fail).is_err()
    );
}
