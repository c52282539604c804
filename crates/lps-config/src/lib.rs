use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

mod publish;
mod secrets;

pub use publish::{
    BudgetSection, KeysEnvSection, LedgerSection, PublishConfig, PurseEntry, RegistrySection,
    RunSection, TimingSection, DEFAULT_PRIVATE_KEY_ENV,
};
pub use secrets::{resolve_secrets, ResolvedSecrets};

/// Known secret-like prefixes. A leaf string starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN", // PEM private keys
    "sk-",
    "AKIA", // AWS access key ID
    "ghp_", // GitHub PAT
    "xoxb-",
];

/// Subtrees holding desired ledger payloads. Their strings are data, not
/// credentials, and may legitimately be long hex.
const PAYLOAD_POINTERS: &[&str] = &["/zones", "/purses"];

/// What the loaded config is used for. `Check` never signs, so it reads
/// fewer sections than `Push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Check,
    Push,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Check => "CHECK",
            ConfigMode::Push => "PUSH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes read by each mode. Must match what the code
/// actually reads.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Check => &[
            "/ledger/read_only_url",
            "/registry",
            "/timing",
            "/run",
            "/zones",
            "/purses",
        ],
        ConfigMode::Push => &[
            "/ledger",
            "/registry",
            "/keys_env",
            "/budget",
            "/timing",
            "/run",
            "/zones",
            "/purses",
        ],
    }
}

/// Unused-key report for `mode`. `Fail` turns a non-clean report into an error.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers_for_mode(mode);
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed.iter().any(|c| within(c, ptr)))
        .collect();
    unused.sort();
    unused.dedup();

    let mut consumed_prefixes: Vec<String> = consumed.iter().map(|c| c.to_string()).collect();
    consumed_prefixes.sort();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(12)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} unused config leaf key(s) detected. First few: {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }

    Ok(report)
}

/// `ptr` is `section` itself or lies below it: "/run" covers "/run/strict"
/// but not "/runtime".
fn within(section: &str, ptr: &str) -> bool {
    ptr.strip_prefix(section)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Every scalar leaf with its JSON pointer, in document order. Empty
/// objects and arrays contribute nothing.
fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut todo = vec![(String::new(), root)];
    while let Some((ptr, v)) = todo.pop() {
        match v {
            Value::Object(map) => todo.extend(map.iter().rev().map(|(k, child)| {
                let token = k.replace('~', "~0").replace('/', "~1");
                (format!("{ptr}/{token}"), child)
            })),
            Value::Array(xs) => todo.extend(
                xs.iter()
                    .enumerate()
                    .rev()
                    .map(|(i, child)| (format!("{ptr}/{i}"), child)),
            ),
            leaf => out.push((ptr, leaf)),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// sha256 of `canonical_json`.
    pub config_hash: String,
    /// Merged config with object keys sorted, so key order in the sources
    /// does not change the hash.
    pub canonical_json: String,
    /// Merged config in declaration order. Zone payloads are taken from
    /// here and must keep the order they were written in.
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Merge YAML docs in order: earlier docs are base, later docs override.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for raw in yaml_docs {
        let doc: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let doc = serde_json::to_value(doc).context("yaml->json conversion failed")?;
        overlay(&mut merged, doc);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json =
        serde_json::to_string(&sorted_keys(&merged)).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key, keeping the base's key positions and
/// appending new keys; anything else (arrays included) is replaced.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base_map), Value::Object(top_map)) => {
            for (k, v) in top_map {
                match base_map.get_mut(&k) {
                    Some(slot) => overlay(slot, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn sorted_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted_keys(v)))
                    .collect(),
            )
        }
        Value::Array(xs) => Value::Array(xs.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        if PAYLOAD_POINTERS.iter().any(|p| within(p, &ptr)) {
            continue;
        }
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    if SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) {
        return true;
    }
    // Raw ed25519 seed pasted where an env var name belongs.
    let hex_part = t.strip_prefix("0x").unwrap_or(t);
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}
