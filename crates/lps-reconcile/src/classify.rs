use lps_schemas::{Classification, Item, ObservedState};

/// Deterministic classification of one item against its observed state.
///
/// - malformed item => Invalid (checked first, nothing else matters)
/// - Absent => NeedsCreate
/// - Present, owner recorded and not `own_namespace` => OwnedByOther
/// - Present, data byte-equal to desired => UpToDate
/// - otherwise => NeedsUpdate
pub fn classify(item: &Item, observed: &ObservedState, own_namespace: &str) -> Classification {
    if let Err(reason) = item.validate() {
        return Classification::Invalid { reason };
    }

    let slot = match observed {
        ObservedState::Absent => return Classification::NeedsCreate,
        ObservedState::Present(slot) => slot,
    };

    if let Some(owner) = &slot.owner {
        if owner != own_namespace {
            return Classification::OwnedByOther {
                owner: owner.clone(),
            };
        }
    }

    if slot.data == item.desired_value {
        Classification::UpToDate
    } else {
        Classification::NeedsUpdate
    }
}

/// Exact-equality check used by confirmation polling.
pub fn is_converged(desired: &str, observed: &ObservedState) -> bool {
    observed.data() == Some(desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lps_schemas::{ItemKind, SlotValue};

    fn item(v: &str) -> Item {
        Item::new("example", v, "example.d", ItemKind::Purse)
    }

    fn present(v: &str, owner: Option<&str>) -> ObservedState {
        ObservedState::Present(SlotValue::new(v, owner.map(str::to_string)))
    }

    #[test]
    fn identical_values_are_up_to_date() {
        for v in ["v1", "7b7d", "é", "a\nb"] {
            let it = item(v);
            assert_eq!(
                classify(&it, &present(v, Some("abc1")), "abc1"),
                Classification::UpToDate
            );
            assert_eq!(classify(&it, &present(v, None), "abc1"), Classification::UpToDate);
        }
    }

    #[test]
    fn absent_is_needs_create() {
        assert_eq!(
            classify(&item("v1"), &ObservedState::Absent, "abc1"),
            Classification::NeedsCreate
        );
    }

    #[test]
    fn differing_value_is_needs_update() {
        assert_eq!(
            classify(&item("v2"), &present("v1", Some("abc1")), "abc1"),
            Classification::NeedsUpdate
        );
        // Not a semantic diff: trailing whitespace counts.
        assert_eq!(
            classify(&item("v1 "), &present("v1", None), "abc1"),
            Classification::NeedsUpdate
        );
    }

    #[test]
    fn foreign_owner_wins_over_equal_data() {
        assert_eq!(
            classify(&item("v1"), &present("v1", Some("xyz9")), "abc1"),
            Classification::OwnedByOther {
                owner: "xyz9".into()
            }
        );
    }

    #[test]
    fn invalid_item_is_never_compared() {
        let mut it = item("v1");
        it.defect = Some("zone is missing .records".into());
        assert_eq!(
            classify(&it, &ObservedState::Absent, "abc1"),
            Classification::Invalid {
                reason: "zone is missing .records".into()
            }
        );
    }

    #[test]
    fn converged_only_on_exact_match() {
        assert!(is_converged("v1", &present("v1", None)));
        assert!(!is_converged("v1", &present("v0", None)));
        assert!(!is_converged("v1", &ObservedState::Absent));
    }
}
