//! lps-reconcile
//!
//! Desired-vs-on-chain comparison.
//!
//! - `classify`: pure, exact byte equality, owner-aware
//! - `decode`: raw read bodies to observations; sentinel "not found"
//!   answers become absence, budget exhaustion becomes a transient error
//! - `StateComparator`: the async reads (slot metadata, then slot data)
//!   feeding `classify`, plus the deploy-result read used while confirming

mod classify;
mod comparator;
pub mod decode;

pub use classify::{classify, is_converged};
pub use comparator::{StateComparator, TEMPLATE_SLOT_ID};
pub use decode::{DeployStatus, NamespaceState, ReadError, SlotMeta};
