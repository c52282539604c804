//! Scenario: Config hash is stable
//!
//! # Invariants under test
//!
//! 1. The same YAML input always yields the same hash and canonical JSON.
//! 2. Key order in the source does not change the hash.
//! 3. A different value changes the hash.
//! 4. Overlays override the base key by key; arrays are replaced whole.

use lps_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
ledger:
  read_only_url: "http://localhost:40403"
  validator_url: "http://localhost:40403"
registry:
  master_registry_uri: "rho:id:abcmaster"
  contract_id: "names"
  box_id: "abc1"
purses:
  - id: "alpha"
    data: "a1"
"#;

const BASE_YAML_REORDERED: &str = r#"
registry:
  box_id: "abc1"
  contract_id: "names"
  master_registry_uri: "rho:id:abcmaster"
purses:
  - data: "a1"
    id: "alpha"
ledger:
  validator_url: "http://localhost:40403"
  read_only_url: "http://localhost:40403"
"#;

const OVERLAY_YAML: &str = r#"
ledger:
  validator_url: "http://validator:40403"
purses:
  - id: "beta"
    data: "b1"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_hash_and_merges() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let j = &merged.config_json;
    assert_eq!(j["ledger"]["read_only_url"], "http://localhost:40403");
    assert_eq!(j["ledger"]["validator_url"], "http://validator:40403");
    let purses = j["purses"].as_array().unwrap();
    assert_eq!(purses.len(), 1);
    assert_eq!(purses[0]["id"], "beta");
}
