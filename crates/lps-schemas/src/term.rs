use serde::{Deserialize, Serialize};

/// Structured intent of a ledger program.
///
/// The rendered program text is what the ledger executes; the op travels
/// with it so in-process ledgers and logs do not have to parse program text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TermOp {
    /// Create the namespace (box) that will own every slot this run writes.
    CreateNamespace {
        namespace_id: String,
        public_key: String,
    },
    /// Create a slot. `credit` is the mint price taken from the contract's
    /// template slot; `None` when the contract does not charge.
    CreateSlot {
        contract_id: String,
        namespace_id: String,
        slot_id: String,
        data: String,
        credit: Option<u64>,
    },
    /// Replace the data of a slot the namespace already owns.
    UpdateSlotData {
        contract_id: String,
        namespace_id: String,
        slot_id: String,
        data: String,
    },
    /// Read a namespace's public key and owned slots.
    ReadNamespace { namespace_id: String },
    /// Read slot metadata (owner, price) without the payload.
    ReadSlots {
        contract_id: String,
        slot_ids: Vec<String>,
    },
    /// Read slot payloads.
    ReadSlotData {
        contract_id: String,
        slot_ids: Vec<String>,
    },
}

impl TermOp {
    pub fn name(&self) -> &'static str {
        match self {
            TermOp::CreateNamespace { .. } => "create_namespace",
            TermOp::CreateSlot { .. } => "create_slot",
            TermOp::UpdateSlotData { .. } => "update_slot_data",
            TermOp::ReadNamespace { .. } => "read_namespace",
            TermOp::ReadSlots { .. } => "read_slots",
            TermOp::ReadSlotData { .. } => "read_slot_data",
        }
    }

    /// `true` for ops that mutate ledger state and therefore go through a
    /// signed deployment.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            TermOp::CreateNamespace { .. }
                | TermOp::CreateSlot { .. }
                | TermOp::UpdateSlotData { .. }
        )
    }

    /// Slot written by this op, if any.
    pub fn target_slot(&self) -> Option<&str> {
        match self {
            TermOp::CreateSlot { slot_id, .. } | TermOp::UpdateSlotData { slot_id, .. } => {
                Some(slot_id)
            }
            _ => None,
        }
    }
}

/// A program in the ledger's contract language, ready to deploy or query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub op: TermOp,
    pub text: String,
}

impl Term {
    pub fn new(op: TermOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }
}
