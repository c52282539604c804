//! Signed deploy envelope.
//!
//! The digest is BLAKE3-256 over a length-prefixed canonical encoding of
//! [`DeployData`]; the signature is over the digest. Field order in the
//! encoding is fixed.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use lps_schemas::{ExecutionBudget, Term, TermOp};
use serde::{Deserialize, Serialize};

use crate::signer::{Signer, SigningError, SIG_ALGORITHM_ED25519};

/// The signed portion of a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployData {
    pub term: String,
    pub timestamp_ms: i64,
    pub phlo_price: u64,
    pub phlo_limit: u64,
    pub valid_after_block_number: i64,
    pub shard_id: String,
}

fn put_field(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.push(b'=');
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value);
}

impl DeployData {
    pub fn new(term: &Term, budget: ExecutionBudget, shard_id: &str, timestamp_ms: i64) -> Self {
        Self {
            term: term.text.clone(),
            timestamp_ms,
            phlo_price: budget.price,
            phlo_limit: budget.limit,
            valid_after_block_number: -1,
            shard_id: shard_id.to_string(),
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.term.len() + 128);
        put_field(&mut out, "term", self.term.as_bytes());
        put_field(&mut out, "timestamp", &self.timestamp_ms.to_be_bytes());
        put_field(&mut out, "phloPrice", &self.phlo_price.to_be_bytes());
        put_field(&mut out, "phloLimit", &self.phlo_limit.to_be_bytes());
        put_field(
            &mut out,
            "validAfterBlockNumber",
            &self.valid_after_block_number.to_be_bytes(),
        );
        put_field(&mut out, "shardId", self.shard_id.as_bytes());
        out
    }

    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.canonical_bytes()).as_bytes()
    }
}

/// A deploy ready for submission. Built and signed once per attempt; any
/// transport-level resubmission reuses it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub data: DeployData,
    /// Structured intent of `data.term`. Not part of the signed payload.
    pub op: TermOp,
    /// Public key hex of the signer.
    pub deployer: String,
    /// Signature hex over `data.digest()`.
    pub signature: String,
    pub sig_algorithm: String,
}

impl SignedEnvelope {
    pub fn seal(
        term: &Term,
        budget: ExecutionBudget,
        shard_id: &str,
        timestamp_ms: i64,
        signer: &dyn Signer,
    ) -> Self {
        let data = DeployData::new(term, budget, shard_id, timestamp_ms);
        let signature = hex::encode(signer.sign(&data.digest()));
        Self {
            data,
            op: term.op.clone(),
            deployer: signer.owner_identity(),
            signature,
            sig_algorithm: signer.algorithm().to_string(),
        }
    }

    /// Deploy id as the ledger reports it.
    pub fn deploy_id(&self) -> &str {
        &self.signature
    }

    /// Check the signature against the embedded deployer key.
    pub fn verify(&self) -> Result<(), SigningError> {
        if self.sig_algorithm != SIG_ALGORITHM_ED25519 {
            return Err(SigningError::InvalidSignature(format!(
                "unsupported algorithm {}",
                self.sig_algorithm
            )));
        }
        let pk = hex::decode(&self.deployer)
            .map_err(|e| SigningError::InvalidSignature(format!("deployer: {e}")))?;
        let pk: [u8; 32] = pk
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidSignature("deployer is not 32 bytes".into()))?;
        let vk = VerifyingKey::from_bytes(&pk)
            .map_err(|e| SigningError::InvalidSignature(format!("deployer: {e}")))?;

        let sig = hex::decode(&self.signature)
            .map_err(|e| SigningError::InvalidSignature(format!("signature: {e}")))?;
        let sig = Signature::from_slice(&sig)
            .map_err(|e| SigningError::InvalidSignature(format!("signature: {e}")))?;

        vk.verify(&self.data.digest(), &sig)
            .map_err(|e| SigningError::InvalidSignature(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;

    fn term() -> Term {
        Term::new(
            TermOp::ReadNamespace {
                namespace_id: "abc1".into(),
            },
            "new x in { x!(1) }",
        )
    }

    #[test]
    fn sealed_envelope_verifies() {
        let signer = Ed25519Signer::from_bytes(&[1u8; 32]);
        let env = SignedEnvelope::seal(&term(), ExecutionBudget::default(), "root", 1_000, &signer);
        assert_eq!(env.deployer, signer.owner_identity());
        assert_eq!(env.sig_algorithm, "ed25519");
        env.verify().unwrap();
    }

    #[test]
    fn tampered_term_fails_verification() {
        let signer = Ed25519Signer::from_bytes(&[1u8; 32]);
        let mut env =
            SignedEnvelope::seal(&term(), ExecutionBudget::default(), "root", 1_000, &signer);
        env.data.term.push(' ');
        assert!(matches!(
            env.verify(),
            Err(SigningError::InvalidSignature(_))
        ));
    }

    #[test]
    fn digest_covers_budget() {
        let a = DeployData::new(&term(), ExecutionBudget::new(1, 100), "root", 5);
        let b = DeployData::new(&term(), ExecutionBudget::new(1, 101), "root", 5);
        assert_ne!(a.digest(), b.digest());
    }
}
