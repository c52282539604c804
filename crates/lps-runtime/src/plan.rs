//! Ordered write plan.
//!
//! Writes may depend on a prerequisite deployment (the namespace that will
//! own the slots). The plan makes that dependency explicit: every
//! prerequisite is deployed and confirmed before any write that names it
//! starts, and a failed prerequisite fails its dependents without a submit.

use lps_execution::TermBuilder;
use lps_schemas::{Classification, Item, Term};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prerequisite {
    Namespace {
        namespace_id: String,
        public_key: String,
    },
}

impl Prerequisite {
    pub fn term(&self, terms: &dyn TermBuilder) -> Term {
        match self {
            Prerequisite::Namespace { public_key, .. } => terms.create_namespace(public_key),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Prerequisite::Namespace { namespace_id, .. } => format!("namespace {namespace_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    /// Mint the slot, paying `credit` from the template price.
    Create { credit: Option<u64> },
    Update,
}

impl WriteOp {
    /// Classification that led to this write.
    pub fn classification(&self) -> Classification {
        match self {
            WriteOp::Create { .. } => Classification::NeedsCreate,
            WriteOp::Update => Classification::NeedsUpdate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStep {
    pub item: Item,
    pub op: WriteOp,
    /// Index into [`Plan::prerequisites`].
    pub requires: Option<usize>,
}

impl WriteStep {
    pub fn term(&self, terms: &dyn TermBuilder) -> Term {
        match &self.op {
            WriteOp::Create { credit } => {
                terms.create_slot(&self.item.id, &self.item.desired_value, *credit)
            }
            WriteOp::Update => terms.update_slot_data(&self.item.id, &self.item.desired_value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub prerequisites: Vec<Prerequisite>,
    pub writes: Vec<WriteStep>,
}

impl Plan {
    /// Build the plan for items already classified as needing a write.
    ///
    /// `namespace_missing` adds the namespace prerequisite and makes every
    /// write depend on it. Items with any other classification are ignored.
    pub fn build(
        needing_write: Vec<(Item, Classification)>,
        namespace_missing: Option<Prerequisite>,
        credit: Option<u64>,
    ) -> Self {
        let mut plan = Plan::default();
        let requires = namespace_missing.map(|p| {
            plan.prerequisites.push(p);
            plan.prerequisites.len() - 1
        });

        for (item, class) in needing_write {
            let op = match class {
                Classification::NeedsCreate => WriteOp::Create { credit },
                Classification::NeedsUpdate => WriteOp::Update,
                _ => continue,
            };
            plan.writes.push(WriteStep { item, op, requires });
        }
        plan
    }

    /// Writes depending on prerequisite `idx`.
    pub fn dependents(&self, idx: usize) -> impl Iterator<Item = &WriteStep> {
        self.writes.iter().filter(move |w| w.requires == Some(idx))
    }
}
