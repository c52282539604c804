//! Deploy executor: the single submission path.
//!
//! One call to [`DeployExecutor::execute`] is one deployment attempt:
//!
//! 1. build and sign the envelope once,
//! 2. submit it under the per-call submit timeout, resending the *same*
//!    envelope after transport failures until the attempt deadline,
//! 3. on acceptance, fire a best-effort block proposal in the background and
//!    return immediately so confirmation polling can start.
//!
//! A `Rejected` answer is terminal for the attempt and is never resubmitted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lps_schemas::{ExecutionBudget, Term};
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::SignedEnvelope;
use crate::gateway::{LedgerError, LedgerGateway};
use crate::signer::Signer;

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_PROPOSE_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_SUBMIT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub shard_id: String,
    pub submit_timeout: Duration,
    pub propose_timeout: Duration,
    pub submit_retry_interval: Duration,
    /// Trigger a block proposal after every accepted submit.
    pub propose_after_submit: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shard_id: "root".to_string(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            propose_timeout: DEFAULT_PROPOSE_TIMEOUT,
            submit_retry_interval: DEFAULT_SUBMIT_RETRY_INTERVAL,
            propose_after_submit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// Ledger refused the deploy. Terminal for this attempt.
    Rejected(String),
    /// No submit went through before the attempt deadline.
    TimedOut { submits: u32, last_error: String },
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Rejected(r) => write!(f, "deploy rejected: {r}"),
            DeployError::TimedOut {
                submits,
                last_error,
            } => write!(
                f,
                "deploy not accepted before deadline after {submits} submit(s): {last_error}"
            ),
        }
    }
}

impl std::error::Error for DeployError {}

/// Proof that the ledger accepted one deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub attempt_id: Uuid,
    pub deploy_id: String,
    pub submitted_at: Instant,
    /// Number of submit calls it took, including transport retries.
    pub submits: u32,
}

pub struct DeployExecutor<G> {
    gateway: Arc<G>,
    signer: Arc<dyn Signer>,
    cfg: ExecutorConfig,
}

impl<G> DeployExecutor<G>
where
    G: LedgerGateway + 'static,
{
    pub fn new(gateway: Arc<G>, signer: Arc<dyn Signer>, cfg: ExecutorConfig) -> Self {
        Self {
            gateway,
            signer,
            cfg,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.cfg
    }

    pub fn owner_identity(&self) -> String {
        self.signer.owner_identity()
    }

    pub fn seal(&self, term: &Term, budget: ExecutionBudget) -> SignedEnvelope {
        SignedEnvelope::seal(
            term,
            budget,
            &self.cfg.shard_id,
            chrono::Utc::now().timestamp_millis(),
            self.signer.as_ref(),
        )
    }

    pub async fn execute(
        &self,
        term: &Term,
        budget: ExecutionBudget,
        deadline: Instant,
    ) -> Result<SubmissionReceipt, DeployError> {
        let envelope = self.seal(term, budget);
        let attempt_id = Uuid::new_v4();
        let op = term.op.name();
        let mut submits: u32 = 0;
        let mut last_error = String::from("deadline already elapsed");

        while Instant::now() < deadline {
            submits += 1;
            let call_deadline = (Instant::now() + self.cfg.submit_timeout).min(deadline);
            debug!(%attempt_id, op, submits, "submit");

            let result = timeout_at(call_deadline, self.gateway.submit(&envelope))
                .await
                .unwrap_or(Err(LedgerError::Timeout));

            match result {
                Ok(receipt) => {
                    info!(%attempt_id, op, deploy_id = %receipt.deploy_id, submits, "deploy accepted");
                    self.spawn_propose(attempt_id);
                    return Ok(SubmissionReceipt {
                        attempt_id,
                        deploy_id: receipt.deploy_id,
                        submitted_at: Instant::now(),
                        submits,
                    });
                }
                Err(LedgerError::Rejected(reason)) => {
                    warn!(%attempt_id, op, %reason, "deploy rejected");
                    return Err(DeployError::Rejected(reason));
                }
                Err(e) => {
                    warn!(%attempt_id, op, submits, error = %e, "submit failed, will resend");
                    last_error = e.to_string();
                }
            }

            let next = Instant::now() + self.cfg.submit_retry_interval;
            if next >= deadline {
                break;
            }
            sleep_until(next).await;
        }

        Err(DeployError::TimedOut {
            submits,
            last_error,
        })
    }

    /// Fire-and-forget: a stalled or failed proposal never blocks polling.
    fn spawn_propose(&self, attempt_id: Uuid) {
        if !self.cfg.propose_after_submit {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let limit = self.cfg.propose_timeout;
        tokio::spawn(async move {
            match timeout(limit, gateway.propose_block()).await {
                Ok(Ok(())) => debug!(%attempt_id, "block proposed"),
                Ok(Err(e)) => warn!(%attempt_id, error = %e, "propose failed, continuing"),
                Err(_) => warn!(%attempt_id, timeout_ms = limit.as_millis() as u64, "propose timed out, continuing"),
            }
        });
    }
}
