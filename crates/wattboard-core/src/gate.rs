//! Suppression of no-op filter changes.
//!
//! Re-renders and repeated setter calls routinely hand the controller a
//! selection identical to the one already applied. Those must not trigger a
//! fetch, or the table would flicker into its loading state for nothing.

use wattboard_types::FilterSet;

/// Whether moving from `previous` to `next` changes anything that affects
/// the fetched data.
///
/// Comparison is by value after identifier normalization, so `None`, `""`
/// and whitespace-only identifiers are all equivalent.
pub fn should_sync(previous: &FilterSet, next: &FilterSet) -> bool {
    !previous.same_selection(next)
}

/// Stateful gate remembering the last admitted selection.
#[derive(Debug, Clone, Default)]
pub struct ChangeGate {
    applied: Option<FilterSet>,
}

impl ChangeGate {
    /// Create a gate that admits the first selection it sees.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `next` if it differs from the last admitted selection.
    ///
    /// Returns `true` when `next` was admitted and is now the applied
    /// selection.
    pub fn admit(&mut self, next: &FilterSet) -> bool {
        if let Some(applied) = &self.applied
            && !should_sync(applied, next)
        {
            return false;
        }
        self.applied = Some(next.normalized());
        true
    }

    /// The last admitted selection.
    pub fn applied(&self) -> Option<&FilterSet> {
        self.applied.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattboard_types::{TimeGranularity, ymd};

    fn base() -> FilterSet {
        FilterSet::new()
            .with_institution("A")
            .with_range(ymd(2024, 1, 1), ymd(2024, 1, 10))
    }

    #[test]
    fn test_identical_selection_does_not_sync() {
        assert!(!should_sync(&base(), &base()));
    }

    #[test]
    fn test_empty_and_unset_ids_are_equivalent() {
        let mut next = base();
        next.device_id = Some(String::new());
        assert!(!should_sync(&base(), &next));

        next.device_id = Some("   ".to_string());
        assert!(!should_sync(&base(), &next));
    }

    #[test]
    fn test_any_field_change_syncs() {
        assert!(should_sync(&base(), &base().with_device("D")));
        assert!(should_sync(
            &base(),
            &base().with_granularity(TimeGranularity::Monthly)
        ));
        assert!(should_sync(&base(), &base().with_range(ymd(2024, 1, 2), ymd(2024, 1, 10))));
        assert!(should_sync(&base(), &base().with_institution("B")));
    }

    #[test]
    fn test_gate_admits_first_then_suppresses_repeats() {
        let mut gate = ChangeGate::new();
        assert!(gate.admit(&base()));
        assert!(!gate.admit(&base()));
        assert!(gate.admit(&base().with_device("D")));
        assert_eq!(gate.applied().and_then(|f| f.device()), Some("D"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn id() -> impl Strategy<Value = Option<String>> {
            prop_oneof![
                Just(None),
                Just(Some(String::new())),
                "[a-c]{1,2}".prop_map(Some),
            ]
        }

        fn filters() -> impl Strategy<Value = FilterSet> {
            (id(), id(), any::<bool>()).prop_map(|(institution_id, device_id, monthly)| {
                FilterSet {
                    institution_id,
                    device_id,
                    granularity: if monthly {
                        TimeGranularity::Monthly
                    } else {
                        TimeGranularity::Daily
                    },
                    start_date: None,
                    end_date: None,
                }
            })
        }

        proptest! {
            #[test]
            fn should_sync_is_reflexive_false(f in filters()) {
                prop_assert!(!should_sync(&f, &f));
            }

            #[test]
            fn should_sync_is_symmetric(a in filters(), b in filters()) {
                prop_assert_eq!(should_sync(&a, &b), should_sync(&b, &a));
            }

            #[test]
            fn should_sync_matches_normalized_inequality(a in filters(), b in filters()) {
                prop_assert_eq!(should_sync(&a, &b), a.normalized() != b.normalized());
            }
        }
    }
}
