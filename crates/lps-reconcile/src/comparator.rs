use std::sync::Arc;

use lps_execution::{LedgerGateway, ReadRequest, TermBuilder};
use lps_schemas::{Classification, Item, ObservedState, SlotValue, Term};
use tracing::debug;

use crate::classify::classify;
use crate::decode::{
    decode_deploy_status, decode_namespace, decode_slot_data, decode_slots, DeployStatus,
    NamespaceState, ReadError, SlotMeta,
};

/// Slot whose price is the mint credit for new slots.
pub const TEMPLATE_SLOT_ID: &str = "0";

/// Reads on-chain state for items and classifies them.
///
/// Stateless between calls: every method issues fresh reads.
pub struct StateComparator<G> {
    gateway: Arc<G>,
    terms: Arc<dyn TermBuilder>,
    depth: u32,
}

impl<G> Clone for StateComparator<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            terms: Arc::clone(&self.terms),
            depth: self.depth,
        }
    }
}

impl<G: LedgerGateway> StateComparator<G> {
    pub fn new(gateway: Arc<G>, terms: Arc<dyn TermBuilder>, depth: u32) -> Self {
        Self {
            gateway,
            terms,
            depth,
        }
    }

    /// Namespace this run writes as.
    pub fn own_namespace(&self) -> &str {
        &self.terms.target().namespace_id
    }

    async fn read(&self, term: Term) -> Result<String, ReadError> {
        let op = term.op.name();
        debug!(op, depth = self.depth, "read_state");
        let body = self
            .gateway
            .read_state(&ReadRequest::new(term, self.depth))
            .await?;
        Ok(body)
    }

    pub async fn read_slot_meta(&self, slot_id: &str) -> Result<Option<SlotMeta>, ReadError> {
        let body = self.read(self.terms.read_slots(&[slot_id.to_string()])).await?;
        Ok(decode_slots(&body)?.remove(slot_id))
    }

    pub async fn read_slot_data(&self, slot_id: &str) -> Result<Option<String>, ReadError> {
        let body = self
            .read(self.terms.read_slot_data(&[slot_id.to_string()]))
            .await?;
        Ok(decode_slot_data(&body)?.remove(slot_id))
    }

    pub async fn read_namespace(&self) -> Result<NamespaceState, ReadError> {
        let body = self.read(self.terms.read_namespace()).await?;
        decode_namespace(&body)
    }

    /// What the contract reported for an executed deploy.
    pub async fn deploy_status(&self, deploy_id: &str) -> Result<DeployStatus, ReadError> {
        debug!(deploy_id, depth = self.depth, "read_deploy_result");
        let body = self
            .gateway
            .read_deploy_result(deploy_id, self.depth)
            .await?;
        decode_deploy_status(&body)
    }

    /// Mint credit for new slots: price of the template slot, if it has one.
    pub async fn template_price(&self) -> Result<Option<u64>, ReadError> {
        Ok(self
            .read_slot_meta(TEMPLATE_SLOT_ID)
            .await?
            .and_then(|m| m.price))
    }

    /// Two reads: metadata (existence, owner), then data. The data read is
    /// skipped when the slot does not exist.
    pub async fn observe(&self, slot_id: &str) -> Result<ObservedState, ReadError> {
        let Some(meta) = self.read_slot_meta(slot_id).await? else {
            return Ok(ObservedState::Absent);
        };
        let data = self.read_slot_data(slot_id).await?.unwrap_or_default();
        Ok(ObservedState::Present(SlotValue::new(data, meta.owner)))
    }

    /// Classify one item. Malformed items are classified without any read.
    pub async fn compare(&self, item: &Item) -> Result<Classification, ReadError> {
        if let Err(reason) = item.validate() {
            return Ok(Classification::Invalid { reason });
        }
        let observed = self.observe(&item.id).await?;
        let c = classify(item, &observed, self.own_namespace());
        debug!(item_id = %item.id, classification = %c, "compared");
        Ok(c)
    }
}
