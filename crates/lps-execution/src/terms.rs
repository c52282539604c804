//! Term builders.
//!
//! A [`TermBuilder`] turns an operation intent into program text for the
//! registry contract. Pure: no IO, no clock.

use lps_schemas::{Term, TermOp};

/// Where on the ledger this run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    /// Registry URI of the master contract (`rho:id:...` without the scheme
    /// is accepted too).
    pub master_registry_uri: String,
    /// Contract whose slots hold the items.
    pub contract_id: String,
    /// Namespace ("box") that owns written slots.
    pub namespace_id: String,
}

impl RegistryTarget {
    pub fn new(
        master_registry_uri: impl Into<String>,
        contract_id: impl Into<String>,
        namespace_id: impl Into<String>,
    ) -> Self {
        Self {
            master_registry_uri: master_registry_uri.into(),
            contract_id: contract_id.into(),
            namespace_id: namespace_id.into(),
        }
    }

    /// Master URI without a `rho:id:` scheme.
    pub fn master_id(&self) -> &str {
        self.master_registry_uri
            .strip_prefix("rho:id:")
            .unwrap_or(&self.master_registry_uri)
    }
}

/// Builds create / update / read programs for the registry contract.
pub trait TermBuilder: Send + Sync {
    fn target(&self) -> &RegistryTarget;

    fn create_namespace(&self, public_key: &str) -> Term;

    /// `credit` is the mint price to pay for the slot, if any.
    fn create_slot(&self, slot_id: &str, data: &str, credit: Option<u64>) -> Term;

    fn update_slot_data(&self, slot_id: &str, data: &str) -> Term;

    fn read_namespace(&self) -> Term;

    fn read_slots(&self, slot_ids: &[String]) -> Term;

    fn read_slot_data(&self, slot_ids: &[String]) -> Term;
}

/// Term builder for the token/name-system registry contract.
#[derive(Debug, Clone)]
pub struct RchainTokenTerms {
    target: RegistryTarget,
}

impl RchainTokenTerms {
    pub fn new(target: RegistryTarget) -> Self {
        Self { target }
    }

    fn master(&self) -> String {
        format!("`rho:id:{}`", self.target.master_id())
    }
}

/// String literal with JSON escaping, which the contract language accepts.
fn lit(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn list_lit(ids: &[String]) -> String {
    let inner: Vec<String> = ids.iter().map(|id| lit(id)).collect();
    format!("[{}]", inner.join(", "))
}

impl TermBuilder for RchainTokenTerms {
    fn target(&self) -> &RegistryTarget {
        &self.target
    }

    fn create_namespace(&self, public_key: &str) -> Term {
        let ns = &self.target.namespace_id;
        let text = format!(
            r#"new deployId(`rho:rchain:deployId`), entryCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *entryCh) |
  for (entry <- entryCh) {{
    entry!(("PUBLIC_REGISTER_BOX", {{ "boxId": {ns}, "publicKey": {pk} }}), *deployId)
  }}
}}"#,
            master = self.master(),
            ns = lit(ns),
            pk = lit(public_key),
        );
        Term::new(
            TermOp::CreateNamespace {
                namespace_id: ns.clone(),
                public_key: public_key.to_string(),
            },
            text,
        )
    }

    fn create_slot(&self, slot_id: &str, data: &str, credit: Option<u64>) -> Term {
        let t = &self.target;
        let quantity = credit.unwrap_or(0);
        let text = format!(
            r#"new deployId(`rho:rchain:deployId`), boxCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *boxCh) |
  for (entry <- boxCh) {{
    entry!(("CREDIT_AND_SWAP", {{ "boxId": {ns}, "contractId": {cid}, "purseId": "0", "quantity": {quantity}, "newId": {sid}, "data": {data}, "merge": false }}), *deployId)
  }}
}}"#,
            master = self.master(),
            ns = lit(&t.namespace_id),
            cid = lit(&t.contract_id),
            sid = lit(slot_id),
            data = lit(data),
        );
        Term::new(
            TermOp::CreateSlot {
                contract_id: t.contract_id.clone(),
                namespace_id: t.namespace_id.clone(),
                slot_id: slot_id.to_string(),
                data: data.to_string(),
                credit,
            },
            text,
        )
    }

    fn update_slot_data(&self, slot_id: &str, data: &str) -> Term {
        let t = &self.target;
        let text = format!(
            r#"new deployId(`rho:rchain:deployId`), boxCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *boxCh) |
  for (entry <- boxCh) {{
    entry!(("UPDATE_PURSE_DATA", {{ "boxId": {ns}, "contractId": {cid}, "purseId": {sid}, "data": {data} }}), *deployId)
  }}
}}"#,
            master = self.master(),
            ns = lit(&t.namespace_id),
            cid = lit(&t.contract_id),
            sid = lit(slot_id),
            data = lit(data),
        );
        Term::new(
            TermOp::UpdateSlotData {
                contract_id: t.contract_id.clone(),
                namespace_id: t.namespace_id.clone(),
                slot_id: slot_id.to_string(),
                data: data.to_string(),
            },
            text,
        )
    }

    fn read_namespace(&self) -> Term {
        let ns = &self.target.namespace_id;
        let text = format!(
            r#"new return, entryCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *entryCh) |
  for (entry <- entryCh) {{
    entry!(("PUBLIC_READ_BOX", {ns}), *return)
  }}
}}"#,
            master = self.master(),
            ns = lit(ns),
        );
        Term::new(
            TermOp::ReadNamespace {
                namespace_id: ns.clone(),
            },
            text,
        )
    }

    fn read_slots(&self, slot_ids: &[String]) -> Term {
        let cid = &self.target.contract_id;
        let text = format!(
            r#"new return, entryCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *entryCh) |
  for (entry <- entryCh) {{
    entry!(("PUBLIC_READ_PURSES", {cid}, {ids}), *return)
  }}
}}"#,
            master = self.master(),
            cid = lit(cid),
            ids = list_lit(slot_ids),
        );
        Term::new(
            TermOp::ReadSlots {
                contract_id: cid.clone(),
                slot_ids: slot_ids.to_vec(),
            },
            text,
        )
    }

    fn read_slot_data(&self, slot_ids: &[String]) -> Term {
        let cid = &self.target.contract_id;
        let text = format!(
            r#"new return, entryCh, lookup(`rho:registry:lookup`) in {{
  lookup!({master}, *entryCh) |
  for (entry <- entryCh) {{
    entry!(("PUBLIC_READ_PURSES_DATA", {cid}, {ids}), *return)
  }}
}}"#,
            master = self.master(),
            cid = lit(cid),
            ids = list_lit(slot_ids),
        );
        Term::new(
            TermOp::ReadSlotData {
                contract_id: cid.clone(),
                slot_ids: slot_ids.to_vec(),
            },
            text,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> RchainTokenTerms {
        RchainTokenTerms::new(RegistryTarget::new("rho:id:abcdef", "dappynamesystem", "abc42"))
    }

    #[test]
    fn read_slots_lists_every_id() {
        let t = terms().read_slots(&["a".into(), "b".into()]);
        assert!(t.text.contains(r#"["a", "b"]"#));
        assert!(t.text.contains("`rho:id:abcdef`"));
        assert!(!t.op.is_write());
    }

    #[test]
    fn payload_is_escaped() {
        let t = terms().update_slot_data("x", "say \"hi\"\n");
        assert!(t.text.contains(r#""say \"hi\"\n""#));
        assert_eq!(t.op.target_slot(), Some("x"));
    }

    #[test]
    fn bare_master_uri_gets_scheme() {
        let t = RchainTokenTerms::new(RegistryTarget::new("abcdef", "c", "abc1"));
        assert!(t.read_namespace().text.contains("`rho:id:abcdef`"));
    }

    #[test]
    fn create_slot_carries_credit() {
        let t = terms().create_slot("example", "00", Some(50));
        assert!(t.text.contains("\"quantity\": 50"));
        match t.op {
            TermOp::CreateSlot { credit, .. } => assert_eq!(credit, Some(50)),
            other => panic!("unexpected op {other:?}"),
        }
    }
}
