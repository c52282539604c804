//! Decoding of raw read-only query bodies.
//!
//! The registry contract answers every read with a single expression. Three
//! shapes matter besides the normal map:
//! - a sentinel string such as `"error: box not found"`: a well-formed
//!   absence, never a value to compare against,
//! - an empty map: nothing recorded for the requested ids,
//! - an execution-budget failure (`out of phlogistons`), which may arrive as
//!   a non-JSON body or as the top-level string expression: transient, retry
//!   the read. The phrase inside a stored value is just data.
//!
//! Deploy results come back through `data-at-name` as a map carrying
//! `status` (`"completed"` on success) and, on failure, a `message`.

use std::collections::BTreeMap;
use std::fmt;

use lps_execution::LedgerError;
use lps_schemas::rho::{first_data_at_name, first_expr, RhoValue};
use serde_json::Value;

const BUDGET_EXHAUSTED_MARKER: &str = "out of phlogistons";

/// Why a read produced no usable observation. Always transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The gateway call itself failed.
    Ledger(LedgerError),
    /// The node ran out of execution budget evaluating the query.
    BudgetExhausted(String),
    /// The body was not in any shape the contract produces.
    Decode(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Ledger(e) => write!(f, "read failed: {e}"),
            ReadError::BudgetExhausted(m) => write!(f, "read ran out of execution budget: {m}"),
            ReadError::Decode(m) => write!(f, "read response malformed: {m}"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<LedgerError> for ReadError {
    fn from(e: LedgerError) -> Self {
        ReadError::Ledger(e)
    }
}

/// `"error: <anything> not found"`
pub fn is_not_found_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("error:") && s.ends_with("not found")
}

/// Slot metadata as recorded by the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMeta {
    /// Namespace (box) that owns the slot.
    pub owner: Option<String>,
    /// Mint price, when the slot is for sale.
    pub price: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceState {
    Absent,
    Present { public_key: Option<String> },
}

/// What the contract reported for one executed deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// Nothing sent on the deploy's name yet: not in a block, or the block
    /// is not visible to this node.
    Pending,
    Completed,
    /// Executed and failed. Re-submitting the same term fails the same way.
    Failed(String),
}

fn budget_check(text: &str) -> Result<(), ReadError> {
    if text.contains(BUDGET_EXHAUSTED_MARKER) {
        return Err(ReadError::BudgetExhausted(text.trim().to_string()));
    }
    Ok(())
}

/// JSON body, or the budget / decode error a non-JSON body stands for.
fn parse_body(body: &str) -> Result<Value, ReadError> {
    serde_json::from_str(body).map_err(|e| {
        budget_check(body)
            .err()
            .unwrap_or_else(|| ReadError::Decode(format!("json: {e}")))
    })
}

/// Parse a body into its first expression. `Ok(None)` means the contract
/// answered with a not-found sentinel.
fn top_expr(body: &str) -> Result<Option<RhoValue>, ReadError> {
    let json = parse_body(body)?;
    let expr = first_expr(&json)
        .map_err(|e| ReadError::Decode(e.to_string()))?
        .ok_or_else(|| ReadError::Decode("query returned no expression".to_string()))?;

    if let Some(s) = expr.as_str() {
        budget_check(s)?;
        if is_not_found_sentinel(s) {
            return Ok(None);
        }
    }
    Ok(Some(expr))
}

fn expect_map<'a>(
    expr: &'a RhoValue,
    what: &str,
) -> Result<&'a BTreeMap<String, RhoValue>, ReadError> {
    match expr {
        RhoValue::Map(m) => Ok(m),
        RhoValue::Nil => Err(ReadError::Decode(format!("{what}: nil"))),
        other => Err(ReadError::Decode(format!("{what}: expected map, got {other:?}"))),
    }
}

/// Price is either a bare integer or a `(currency, amount)` pair.
fn price_of(v: &RhoValue) -> Option<u64> {
    match v {
        RhoValue::Int(i) => u64::try_from(*i).ok(),
        RhoValue::List(xs) | RhoValue::Tuple(xs) => xs.last().and_then(price_of),
        _ => None,
    }
}

/// Decode a slot-metadata read. Ids missing from the answer are absent.
pub fn decode_slots(body: &str) -> Result<BTreeMap<String, SlotMeta>, ReadError> {
    let Some(expr) = top_expr(body)? else {
        return Ok(BTreeMap::new());
    };
    let map = expect_map(&expr, "slots")?;

    let mut out = BTreeMap::new();
    for (id, slot) in map {
        if matches!(slot, RhoValue::Nil) {
            continue;
        }
        let fields = expect_map(slot, id)?;
        let owner = fields.get("boxId").and_then(RhoValue::as_str).map(str::to_string);
        let price = fields.get("price").and_then(price_of);
        out.insert(id.clone(), SlotMeta { owner, price });
    }
    Ok(out)
}

/// Decode a slot-data read. Ids missing from the answer carry no data.
pub fn decode_slot_data(body: &str) -> Result<BTreeMap<String, String>, ReadError> {
    let Some(expr) = top_expr(body)? else {
        return Ok(BTreeMap::new());
    };
    let map = expect_map(&expr, "slot data")?;

    let mut out = BTreeMap::new();
    for (id, data) in map {
        match data {
            RhoValue::Nil => {}
            RhoValue::String(s) if is_not_found_sentinel(s) => {}
            RhoValue::String(s) | RhoValue::Bytes(s) => {
                out.insert(id.clone(), s.clone());
            }
            other => {
                return Err(ReadError::Decode(format!(
                    "slot data for {id}: expected string, got {other:?}"
                )))
            }
        }
    }
    Ok(out)
}

pub fn decode_namespace(body: &str) -> Result<NamespaceState, ReadError> {
    let Some(expr) = top_expr(body)? else {
        return Ok(NamespaceState::Absent);
    };
    let map = expect_map(&expr, "namespace")?;
    let public_key = map
        .get("publicKey")
        .and_then(RhoValue::as_str)
        .map(str::to_string);
    Ok(NamespaceState::Present { public_key })
}

/// Decode a `data-at-name` body read on a deploy's own name.
pub fn decode_deploy_status(body: &str) -> Result<DeployStatus, ReadError> {
    let json = parse_body(body)?;
    let Some(expr) = first_data_at_name(&json).map_err(|e| ReadError::Decode(e.to_string()))?
    else {
        return Ok(DeployStatus::Pending);
    };
    if let Some(s) = expr.as_str() {
        budget_check(s)?;
        return Ok(DeployStatus::Failed(s.to_string()));
    }
    let map = expect_map(&expr, "deploy result")?;
    let status = map.get("status").and_then(RhoValue::as_str);
    if status == Some("completed") {
        return Ok(DeployStatus::Completed);
    }
    let reason = map
        .get("message")
        .and_then(RhoValue::as_str)
        .or(status)
        .unwrap_or("deploy failed without a status");
    Ok(DeployStatus::Failed(reason.to_string()))
}
