/// Namespace ("box") as recorded by the paper ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceRecord {
    pub public_key: String,
}

/// One slot ("purse") as recorded by the paper ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRecord {
    /// Owning namespace id.
    pub owner: String,
    pub data: String,
    pub price: Option<u64>,
}

impl SlotRecord {
    pub fn new(owner: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            data: data.into(),
            price: None,
        }
    }
}

/// Every gateway call, in arrival order. Used for ordering assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    Submit {
        op: &'static str,
        /// Slot or namespace the deploy writes.
        target: String,
        deploy_id: String,
    },
    Propose,
    Read {
        op: &'static str,
        ids: Vec<String>,
    },
    /// Lookup of an executed deploy's result. Not a state read.
    DeployResult { deploy_id: String },
}

impl LedgerCall {
    pub fn is_submit(&self) -> bool {
        matches!(self, LedgerCall::Submit { .. })
    }

    pub fn is_read(&self) -> bool {
        matches!(self, LedgerCall::Read { .. })
    }
}

/// A deploy the ledger accepted but whose execution failed when its block
/// was finalized. State is left untouched, as on a real node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedDeploy {
    pub deploy_id: String,
    pub reason: String,
}
