use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback execution price when the caller does not supply one.
pub const DEFAULT_EXECUTION_PRICE: u64 = 1;

/// Fallback execution limit when the caller does not supply one.
pub const DEFAULT_EXECUTION_LIMIT: u64 = 100_000_000;

/// Network suffixes stripped from a zone origin to obtain its slot id.
const ORIGIN_SUFFIXES: &[&str] = &[".dappy", ".d"];

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// What kind of local declaration an item was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A name-system zone; desired value is the hex of its compact JSON.
    Zone,
    /// A raw purse payload supplied verbatim.
    Purse,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Zone => "zone",
            ItemKind::Purse => "purse",
        }
    }
}

/// One unit of desired state.
///
/// Built from local configuration at the start of a run and never mutated
/// afterwards. `defect` records a structural problem detected at build time
/// (e.g. a zone without `records`); such items are reported, never written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Slot id, unique within the registry contract namespace.
    pub id: String,
    /// Exact value the slot must hold once converged.
    pub desired_value: String,
    /// Domain name or file identifier, for reporting.
    pub origin: String,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect: Option<String>,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        desired_value: impl Into<String>,
        origin: impl Into<String>,
        kind: ItemKind,
    ) -> Self {
        Self {
            id: id.into(),
            desired_value: desired_value.into(),
            origin: origin.into(),
            kind,
            defect: None,
        }
    }

    /// Raw purse item: the id doubles as the origin.
    pub fn purse(id: impl Into<String>, data: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), data, id, ItemKind::Purse)
    }

    /// Build a zone item from its JSON declaration.
    ///
    /// The slot id is the zone origin without its network suffix
    /// (`example.d` -> `example`). The desired value is the lowercase hex
    /// of the zone's compact JSON serialization in declaration order, so a
    /// zone published earlier with the same declaration compares equal.
    pub fn zone(zone: &Value) -> Self {
        let origin = zone
            .get("origin")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let desired_value = hex::encode(zone.to_string());
        let mut item = Self::new(slot_id_from_origin(&origin), desired_value, origin, ItemKind::Zone);
        item.defect = zone_defect(zone);
        item
    }

    /// Check the item is well-formed enough to be written.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(defect) = &self.defect {
            return Err(defect.clone());
        }
        if self.id.trim().is_empty() {
            return Err("missing id".to_string());
        }
        if self.desired_value.is_empty() {
            return Err("missing desired value".to_string());
        }
        Ok(())
    }
}

/// Strip a trailing `.d` / `.dappy` network label from a zone origin.
pub fn slot_id_from_origin(origin: &str) -> String {
    for suffix in ORIGIN_SUFFIXES {
        if let Some(stripped) = origin.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    origin.to_string()
}

fn zone_defect(zone: &Value) -> Option<String> {
    let Some(obj) = zone.as_object() else {
        return Some("zone is not a JSON object".to_string());
    };
    match obj.get("origin").and_then(Value::as_str) {
        Some(o) if !o.trim().is_empty() => {}
        _ => return Some("zone is missing .origin".to_string()),
    }
    let Some(records) = obj.get("records").and_then(Value::as_array) else {
        return Some("zone is missing .records".to_string());
    };
    for (i, rec) in records.iter().enumerate() {
        for field in ["name", "type", "data"] {
            if rec.get(field).and_then(Value::as_str).is_none() {
                return Some(format!("zone record {i} is missing .{field}"));
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Observed state
// ---------------------------------------------------------------------------

/// A slot as currently recorded on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValue {
    /// Decoded slot data. Empty when the slot exists but carries no data.
    pub data: String,
    /// Namespace that owns the slot, when the ledger encodes one.
    pub owner: Option<String>,
}

impl SlotValue {
    pub fn new(data: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            data: data.into(),
            owner,
        }
    }
}

/// Result of reading one item's current on-chain value.
///
/// Derived fresh on every read; never cached across runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservedState {
    /// Slot was never created.
    Absent,
    Present(SlotValue),
}

impl ObservedState {
    pub fn is_absent(&self) -> bool {
        matches!(self, ObservedState::Absent)
    }

    /// Data held by the slot, if it exists.
    pub fn data(&self) -> Option<&str> {
        match self {
            ObservedState::Absent => None,
            ObservedState::Present(v) => Some(v.data.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Comparison of an item's desired value with its observed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    UpToDate,
    NeedsCreate,
    NeedsUpdate,
    /// The slot exists but belongs to another namespace.
    OwnedByOther { owner: String },
    /// The local item is malformed; nothing is read or written for it.
    Invalid { reason: String },
}

impl Classification {
    /// Human status used by the check summary.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::UpToDate => "ok",
            Classification::NeedsCreate => "not found",
            Classification::NeedsUpdate => "stale, not matching",
            Classification::OwnedByOther { .. } => "owned by a conflicting identity",
            Classification::Invalid { .. } => "invalid local item",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::OwnedByOther { owner } => {
                write!(f, "{} ({owner})", self.label())
            }
            Classification::Invalid { reason } => write!(f, "{} ({reason})", self.label()),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal result for one item. Every item fed to a run produces exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Ledger already held the desired value; nothing was submitted.
    AlreadyCurrent,
    /// A write was submitted and read back with the exact desired value.
    Confirmed,
    /// The ledger refused the write (budget, malformed term, prerequisite).
    Rejected { reason: String },
    /// No confirmation before the deadline. Soft: a later run re-checks.
    TimedOut,
    /// Another namespace owns, or won the race for, the slot.
    OwnershipConflict { owner: String },
    /// Local item is malformed and was never submitted.
    Invalid { reason: String },
}

impl Outcome {
    /// `true` when the ledger holds the desired value at the end of the run.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::AlreadyCurrent | Outcome::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::AlreadyCurrent => "already_current",
            Outcome::Confirmed => "confirmed",
            Outcome::Rejected { .. } => "rejected",
            Outcome::TimedOut => "timed_out",
            Outcome::OwnershipConflict { .. } => "ownership_conflict",
            Outcome::Invalid { .. } => "invalid",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::AlreadyCurrent => f.write_str("up to date, nothing deployed"),
            Outcome::Confirmed => f.write_str("deployed and confirmed on chain"),
            Outcome::Rejected { reason } => write!(f, "rejected: {reason}"),
            Outcome::TimedOut => f.write_str("not confirmed before deadline, re-check later"),
            Outcome::OwnershipConflict { owner } => {
                write!(f, "owned by a conflicting identity ({owner})")
            }
            Outcome::Invalid { reason } => write!(f, "invalid local item: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution budget
// ---------------------------------------------------------------------------

/// The ledger's resource metering for one transaction (price per unit, cap).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionBudget {
    pub price: u64,
    pub limit: u64,
}

impl ExecutionBudget {
    pub fn new(price: u64, limit: u64) -> Self {
        Self { price, limit }
    }
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            price: DEFAULT_EXECUTION_PRICE,
            limit: DEFAULT_EXECUTION_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zone_origin_suffix_is_stripped() {
        assert_eq!(slot_id_from_origin("example.d"), "example");
        assert_eq!(slot_id_from_origin("example.dappy"), "example");
        assert_eq!(slot_id_from_origin("example"), "example");
        assert_eq!(slot_id_from_origin(".d"), ".d");
    }

    #[test]
    fn zone_desired_value_is_hex_of_compact_json() {
        let zone = json!({"origin": "example", "records": []});
        let item = Item::zone(&zone);
        assert_eq!(item.id, "example");
        assert_eq!(item.desired_value, hex::encode(zone.to_string()));
        assert!(item.validate().is_ok());
    }

    #[test]
    fn zone_json_keeps_declaration_order() {
        let declared = r#"{"origin":"example.d","ttl":3600,"records":[{"name":"@","type":"A","data":"127.0.0.1"}]}"#;
        let zone: Value = serde_json::from_str(declared).unwrap();
        let item = Item::zone(&zone);
        let encoded = hex::decode(&item.desired_value).unwrap();
        assert_eq!(String::from_utf8(encoded).unwrap(), declared);
    }

    #[test]
    fn zone_missing_record_field_is_defective() {
        let zone = json!({"origin": "example", "records": [{"name": "@", "type": "A"}]});
        let item = Item::zone(&zone);
        assert_eq!(
            item.validate().unwrap_err(),
            "zone record 0 is missing .data"
        );
    }

    #[test]
    fn zone_without_records_is_defective() {
        let item = Item::zone(&json!({"origin": "example"}));
        assert!(item.validate().unwrap_err().contains(".records"));
    }

    #[test]
    fn budget_defaults() {
        let b = ExecutionBudget::default();
        assert_eq!(b.price, 1);
        assert_eq!(b.limit, 100_000_000);
    }

    #[test]
    fn only_current_and_confirmed_are_success() {
        assert!(Outcome::AlreadyCurrent.is_success());
        assert!(Outcome::Confirmed.is_success());
        assert!(!Outcome::TimedOut.is_success());
        assert!(!Outcome::Rejected {
            reason: "x".into()
        }
        .is_success());
    }
}
