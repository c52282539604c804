use std::collections::BTreeMap;

use lps_schemas::{Classification, Item, ItemKind, Outcome};
use serde::Serialize;

/// Terminal state of one item after `reconcile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub origin: String,
    pub kind: ItemKind,
    /// Classification from the initial comparison; `None` when the ledger
    /// could not be read before the deadline.
    pub classification: Option<Classification>,
    pub outcome: Outcome,
    /// Deploy id of the accepted write, when one was submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_id: Option<String>,
}

impl ItemReport {
    pub fn new(item: &Item, classification: Option<Classification>, outcome: Outcome) -> Self {
        Self {
            id: item.id.clone(),
            origin: item.origin.clone(),
            kind: item.kind,
            classification,
            outcome,
            deploy_id: None,
        }
    }

    pub fn line(&self) -> String {
        format!("{} ({}): {}", self.id, self.origin, self.outcome)
    }
}

/// id -> outcome for every item of a run. Exactly one entry per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    items: BTreeMap<String, ItemReport>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ItemReport) {
        self.items.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&ItemReport> {
        self.items.get(id)
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.items.get(id).map(|e| &e.outcome)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every item is `AlreadyCurrent` or `Confirmed`.
    pub fn all_succeeded(&self) -> bool {
        self.items.values().all(|e| e.outcome.is_success())
    }

    /// Outcome name -> count, in stable order.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for e in self.items.values() {
            *out.entry(e.outcome.as_str()).or_insert(0) += 1;
        }
        out
    }

    /// Non-strict runs always succeed; strict runs need every item current
    /// or confirmed.
    pub fn is_success(&self, strict: bool) -> bool {
        !strict || self.all_succeeded()
    }

    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.is_success(strict) {
            0
        } else {
            1
        }
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .counts()
            .into_iter()
            .map(|(k, n)| format!("{n} {k}"))
            .collect();
        format!("{} item(s): {}", self.len(), parts.join(", "))
    }

    pub fn lines(&self) -> Vec<String> {
        self.items.values().map(ItemReport::line).collect()
    }
}

/// One item's status in check-only mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    pub id: String,
    pub origin: String,
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckEntry {
    pub fn status(&self) -> String {
        match (&self.classification, &self.error) {
            (Some(c), _) => c.to_string(),
            (None, Some(e)) => format!("unknown, ledger unreadable ({e})"),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// Result of `check`: classification per item, nothing written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    items: BTreeMap<String, CheckEntry>,
}

impl CheckReport {
    pub fn insert(&mut self, entry: CheckEntry) {
        self.items.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&CheckEntry> {
        self.items.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CheckEntry> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn all_up_to_date(&self) -> bool {
        self.items
            .values()
            .all(|e| e.classification == Some(Classification::UpToDate))
    }

    pub fn exit_code(&self, strict: bool) -> i32 {
        if !strict || self.all_up_to_date() {
            0
        } else {
            1
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.items
            .values()
            .map(|e| format!("{}: {}", e.origin, e.status()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: &[(&str, Outcome)]) -> Report {
        let mut r = Report::new();
        for (id, o) in outcomes {
            r.insert(ItemReport::new(&Item::purse(*id, "v"), None, o.clone()));
        }
        r
    }

    #[test]
    fn timed_out_only_fails_strict_runs() {
        let r = report(&[("a", Outcome::Confirmed), ("b", Outcome::TimedOut)]);
        assert_eq!(r.exit_code(false), 0);
        assert_eq!(r.exit_code(true), 1);
    }

    #[test]
    fn all_current_passes_strict() {
        let r = report(&[("a", Outcome::AlreadyCurrent), ("b", Outcome::Confirmed)]);
        assert_eq!(r.exit_code(true), 0);
        assert_eq!(r.summary(), "2 item(s): 1 already_current, 1 confirmed");
    }

    #[test]
    fn check_lines_use_status_labels() {
        let mut c = CheckReport::default();
        c.insert(CheckEntry {
            id: "example".into(),
            origin: "example.d".into(),
            classification: Some(Classification::NeedsUpdate),
            error: None,
        });
        assert_eq!(c.lines(), vec!["example.d: stale, not matching".to_string()]);
        assert_eq!(c.exit_code(true), 1);
    }
}
