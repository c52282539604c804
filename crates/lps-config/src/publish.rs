//! Typed view of the publish configuration.
//!
//! Every section but `ledger` and `registry` has defaults. Registry
//! identifiers default to empty so that a missing one is reported by the
//! reconciler's own validation, before any ledger call.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use lps_execution::{
    ExecutorConfig, RegistryTarget, DEFAULT_PROPOSE_TIMEOUT, DEFAULT_SUBMIT_RETRY_INTERVAL,
    DEFAULT_SUBMIT_TIMEOUT,
};
use lps_runtime::{
    RunPolicy, DEFAULT_BOOTSTRAP_DEADLINE, DEFAULT_POLL_INTERVAL, DEFAULT_READ_DEPTH,
    DEFAULT_WRITE_DEADLINE,
};
use lps_schemas::{
    ExecutionBudget, Item, DEFAULT_EXECUTION_LIMIT, DEFAULT_EXECUTION_PRICE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoadedConfig;

pub const DEFAULT_PRIVATE_KEY_ENV: &str = "LPS_PRIVATE_KEY";
const DEFAULT_SHARD_ID: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSection {
    pub read_only_url: String,
    /// Required by `push`.
    #[serde(default)]
    pub validator_url: Option<String>,
    #[serde(default)]
    pub admin_url: Option<String>,
    #[serde(default = "default_shard_id")]
    pub shard_id: String,
}

fn default_shard_id() -> String {
    DEFAULT_SHARD_ID.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub master_registry_uri: String,
    pub contract_id: String,
    /// Namespace the items are written under.
    pub box_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysEnvSection {
    /// NAME of the env var holding the hex private key.
    pub private_key: String,
}

impl Default for KeysEnvSection {
    fn default() -> Self {
        Self {
            private_key: DEFAULT_PRIVATE_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    pub price: u64,
    pub limit: u64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            price: DEFAULT_EXECUTION_PRICE,
            limit: DEFAULT_EXECUTION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub poll_interval_ms: u64,
    pub submit_timeout_ms: u64,
    pub propose_timeout_ms: u64,
    pub submit_retry_interval_ms: u64,
    pub write_deadline_ms: u64,
    pub bootstrap_deadline_ms: u64,
    pub read_depth: u32,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            submit_timeout_ms: DEFAULT_SUBMIT_TIMEOUT.as_millis() as u64,
            propose_timeout_ms: DEFAULT_PROPOSE_TIMEOUT.as_millis() as u64,
            submit_retry_interval_ms: DEFAULT_SUBMIT_RETRY_INTERVAL.as_millis() as u64,
            write_deadline_ms: DEFAULT_WRITE_DEADLINE.as_millis() as u64,
            bootstrap_deadline_ms: DEFAULT_BOOTSTRAP_DEADLINE.as_millis() as u64,
            read_depth: DEFAULT_READ_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub strict: bool,
    pub max_concurrency: usize,
    pub propose_after_submit: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            strict: false,
            max_concurrency: 1,
            propose_after_submit: true,
        }
    }
}

/// Raw purse payload; `data` is written verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurseEntry {
    pub id: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub ledger: LedgerSection,
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub keys_env: KeysEnvSection,
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub run: RunSection,
    /// Zone declarations, kept as JSON: their compact serialization is the
    /// desired slot value.
    #[serde(default)]
    pub zones: Vec<Value>,
    #[serde(default)]
    pub purses: Vec<PurseEntry>,
}

impl PublishConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("invalid publish config")
    }

    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json(&loaded.config_json)
    }

    /// Zones first, then purses, in declaration order.
    pub fn items(&self) -> Result<Vec<Item>> {
        if self.zones.is_empty() && self.purses.is_empty() {
            bail!("no zones or purses configured");
        }
        let zones = self.zones.iter().map(Item::zone);
        let purses = self.purses.iter().map(|p| Item::purse(&p.id, &p.data));
        Ok(zones.chain(purses).collect())
    }

    pub fn registry_target(&self) -> RegistryTarget {
        RegistryTarget::new(
            &self.registry.master_registry_uri,
            &self.registry.contract_id,
            &self.registry.box_id,
        )
    }

    pub fn budget(&self) -> ExecutionBudget {
        ExecutionBudget::new(self.budget.price, self.budget.limit)
    }

    pub fn run_policy(&self) -> RunPolicy {
        let t = &self.timing;
        RunPolicy {
            budget: self.budget(),
            poll_interval: Duration::from_millis(t.poll_interval_ms),
            write_deadline: Duration::from_millis(t.write_deadline_ms),
            bootstrap_deadline: Duration::from_millis(t.bootstrap_deadline_ms),
            read_depth: t.read_depth,
            strict: self.run.strict,
            max_concurrency: self.run.max_concurrency,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let t = &self.timing;
        ExecutorConfig {
            shard_id: self.ledger.shard_id.clone(),
            submit_timeout: Duration::from_millis(t.submit_timeout_ms),
            propose_timeout: Duration::from_millis(t.propose_timeout_ms),
            submit_retry_interval: Duration::from_millis(t.submit_retry_interval_ms),
            propose_after_submit: self.run.propose_after_submit,
        }
    }
}
