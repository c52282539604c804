//! lps-schemas
//!
//! Shared data model for the purse reconciliation engine.
//!
//! - `Item` is one unit of desired state (a zone or a raw purse payload).
//! - `ObservedState` is what a fresh ledger read produced for that item.
//! - `Classification` is the pure comparison of the two.
//! - `Outcome` is the single terminal result reported per item.
//! - `Term` pairs the rendered contract payload with the structured
//!   operation it encodes.
//! - `rho` decodes and encodes the ledger's explore-deploy value shape.
//!
//! Pure types. No IO, no clock, no ledger calls.

mod term;
mod types;

pub mod rho;

pub use term::{Term, TermOp};
pub use types::*;
