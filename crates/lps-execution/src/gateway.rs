//! Ledger gateway boundary.
//!
//! Everything the engine knows about the remote ledger goes through
//! [`LedgerGateway`]. Implementations: `lps-ledger-http` (live node) and
//! `lps-ledger-paper` (deterministic in-memory ledger).

use std::fmt;

use lps_schemas::Term;

use crate::envelope::SignedEnvelope;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failure of a single gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network failure, connection reset, 5xx. Retryable.
    Transport(String),
    /// The ledger refused the deploy (bad signature, insufficient budget,
    /// malformed term). Not retryable with the same payload.
    Rejected(String),
    /// A response arrived but could not be decoded.
    Decode(String),
    /// The call did not complete within its own timeout.
    Timeout,
}

impl LedgerError {
    /// `true` when resending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LedgerError::Rejected(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Transport(m) => write!(f, "ledger transport error: {m}"),
            LedgerError::Rejected(m) => write!(f, "ledger rejected deploy: {m}"),
            LedgerError::Decode(m) => write!(f, "ledger response decode error: {m}"),
            LedgerError::Timeout => write!(f, "ledger call timed out"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

/// Acknowledgement that the ledger accepted a signed deploy into its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Ledger-side deploy identifier (the deploy signature, hex).
    pub deploy_id: String,
}

/// A read-only query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub term: Term,
    /// How many historical blocks the node may inspect for the value.
    pub depth: u32,
}

impl ReadRequest {
    pub fn new(term: Term, depth: u32) -> Self {
        Self { term, depth }
    }
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait LedgerGateway: Send + Sync {
    fn gateway_name(&self) -> &'static str;

    /// Hand a signed deploy to a validator.
    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt, LedgerError>;

    /// Ask the validator to finalize a block. Best-effort.
    async fn propose_block(&self) -> Result<(), LedgerError>;

    /// Execute a read-only query and return the raw response body.
    ///
    /// Decoding is the caller's job: sentinels such as "not found" arrive as
    /// ordinary successful bodies.
    async fn read_state(&self, req: &ReadRequest) -> Result<String, LedgerError>;

    /// Raw `data-at-name` body for the deploy's own unforgeable name, where
    /// the contract reports how executing `deploy_id` went.
    async fn read_deploy_result(&self, deploy_id: &str, depth: u32)
        -> Result<String, LedgerError>;
}
