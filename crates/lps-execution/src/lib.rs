//! lps-execution
//!
//! Ledger-facing boundary of the engine:
//! - `LedgerGateway`: submit / propose / read against a ledger node
//! - `TermBuilder` + `RchainTokenTerms`: program text for the registry contract
//! - `Signer` + `Ed25519Signer`, `SignedEnvelope`: deploy signing
//! - `DeployExecutor`: the single submission path (sign once, submit,
//!   best-effort propose)

mod envelope;
mod executor;
mod gateway;
mod signer;
mod terms;

pub use envelope::{DeployData, SignedEnvelope};
pub use executor::{
    DeployError, DeployExecutor, ExecutorConfig, SubmissionReceipt, DEFAULT_PROPOSE_TIMEOUT,
    DEFAULT_SUBMIT_RETRY_INTERVAL, DEFAULT_SUBMIT_TIMEOUT,
};
pub use gateway::{LedgerError, LedgerGateway, ReadRequest, SubmitReceipt};
pub use signer::{Ed25519Signer, Signer, SigningError, SIG_ALGORITHM_ED25519};
pub use terms::{RchainTokenTerms, RegistryTarget, TermBuilder};
