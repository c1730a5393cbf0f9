//! # Matching Engine
//!
//! Decides which items of a search page belong in a rule's album.
//!
//! Selection is pure and order-preserving. Three stages run in a fixed order,
//! each narrowing the previous stage's output:
//!
//! 1. **Base set**: for ALL-of rules with more than one required person, keep
//!    items whose people include every required person. ANY-of rules keep every
//!    item because the search already returned only items containing at least
//!    one required person (see [`MatchOptions::verify_any_of`]).
//! 2. **Exclusion**: drop items containing any excluded person.
//! 3. **Exclusivity**: for exclusive rules, keep items whose people all belong
//!    to the required set.
//!
//! An item with no recognised people passes stages 2 and 3 trivially.

use crate::rule::{RequiredOperation, Rule};
use bridge_traits::media::MediaItem;

/// Tuning for [`select_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Also require ANY-of matches to contain at least one required person.
    ///
    /// Off by default: the search service already applies this filter.
    pub verify_any_of: bool,
}

/// Select the items of `items` that `rule` adds to its album.
///
/// Equivalent to [`select_with`] with default options.
pub fn select(items: &[MediaItem], rule: &Rule) -> Vec<MediaItem> {
    select_with(items, rule, MatchOptions::default())
}

/// Select with explicit [`MatchOptions`].
pub fn select_with(items: &[MediaItem], rule: &Rule, options: MatchOptions) -> Vec<MediaItem> {
    items
        .iter()
        .filter(|item| in_base_set(item, rule, options))
        .filter(|item| !has_excluded_person(item, rule))
        .filter(|item| satisfies_exclusivity(item, rule))
        .cloned()
        .collect()
}

fn in_base_set(item: &MediaItem, rule: &Rule, options: MatchOptions) -> bool {
    let required = rule.required();
    match rule.operation() {
        RequiredOperation::All if required.len() > 1 => item.person_ids.is_superset(required),
        // With a single required person ALL-of and ANY-of coincide.
        RequiredOperation::All | RequiredOperation::Any => {
            !options.verify_any_of || !item.person_ids.is_disjoint(required)
        }
    }
}

fn has_excluded_person(item: &MediaItem, rule: &Rule) -> bool {
    !rule.excluded().is_empty() && !item.person_ids.is_disjoint(rule.excluded())
}

fn satisfies_exclusivity(item: &MediaItem, rule: &Rule) -> bool {
    !rule.is_exclusive() || item.person_ids.is_subset(rule.required())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, people: &[&str]) -> MediaItem {
        MediaItem::new(id, "2024-01-01T00:00:00.000Z").with_people(people.iter().copied())
    }

    fn rule(required: &[&str]) -> Rule {
        Rule::new(required.iter().copied(), "album", "k").unwrap()
    }

    fn ids(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    // Scenario A
    #[test]
    fn test_any_of_keeps_items_with_extra_people() {
        let selected = select(&[item("a", &["P1", "P2"])], &rule(&["P1"]));
        assert_eq!(ids(&selected), vec!["a"]);
    }

    // Scenario B
    #[test]
    fn test_all_of_requires_every_person() {
        let rule = rule(&["P1", "P2"]).with_operation(RequiredOperation::All);
        let items = [item("only-p1", &["P1"]), item("all-three", &["P1", "P2", "P3"])];

        assert_eq!(ids(&select(&items, &rule)), vec!["all-three"]);
    }

    // Scenario C
    #[test]
    fn test_excluded_person_drops_item() {
        let rule = rule(&["P1"]).excluding(["P3"]);
        let items = [item("with-p3", &["P1", "P3"]), item("without", &["P1", "P2"])];

        assert_eq!(ids(&select(&items, &rule)), vec!["without"]);
    }

    // Scenario D
    #[test]
    fn test_exclusive_requires_subset() {
        let rule = rule(&["P1", "P2"]).exclusive(true);
        let items = [
            item("exact", &["P1", "P2"]),
            item("stranger", &["P1", "P2", "P3"]),
            item("subset", &["P1"]),
        ];

        assert_eq!(ids(&select(&items, &rule)), vec!["exact", "subset"]);
    }

    #[test]
    fn test_exclusive_and_all_of_combined() {
        let rule = rule(&["P1", "P2"])
            .with_operation(RequiredOperation::All)
            .exclusive(true);
        let items = [
            item("exact", &["P1", "P2"]),
            item("stranger", &["P1", "P2", "P3"]),
            item("subset", &["P1"]),
        ];

        assert_eq!(ids(&select(&items, &rule)), vec!["exact"]);
    }

    #[test]
    fn test_single_person_all_of_equals_any_of() {
        let items = [
            item("a", &["P1"]),
            item("b", &["P1", "P2"]),
            item("c", &[]),
            item("d", &["P9"]),
        ];
        let any = rule(&["P1"]);
        let all = rule(&["P1"]).with_operation(RequiredOperation::All);

        assert_eq!(select(&items, &any), select(&items, &all));
    }

    #[test]
    fn test_item_without_people_passes_exclusion_and_exclusivity() {
        let rule = rule(&["P1"]).excluding(["P3"]).exclusive(true);
        assert_eq!(ids(&select(&[item("empty", &[])], &rule)), vec!["empty"]);
    }

    #[test]
    fn test_all_of_drops_item_without_people() {
        let rule = rule(&["P1", "P2"]).with_operation(RequiredOperation::All);
        assert!(select(&[item("empty", &[])], &rule).is_empty());
    }

    #[test]
    fn test_input_order_preserved() {
        let items = [item("c", &["P1"]), item("a", &["P1"]), item("b", &["P1"])];
        assert_eq!(ids(&select(&items, &rule(&["P1"]))), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_verify_any_of_option() {
        let items = [item("match", &["P2"]), item("unrelated", &["P9"]), item("empty", &[])];
        let rule = rule(&["P1", "P2"]);

        assert_eq!(select(&items, &rule).len(), 3);
        assert_eq!(
            ids(&select_with(&items, &rule, MatchOptions { verify_any_of: true })),
            vec!["match"]
        );
    }

    #[test]
    fn test_empty_page() {
        assert!(select(&[], &rule(&["P1"])).is_empty());
    }

    /// Every combination of people drawn from a small universe, checked against
    /// the set properties of each stage.
    #[test]
    fn test_properties_over_all_people_combinations() {
        let universe = ["P1", "P2", "P3", "P4"];
        let items: Vec<MediaItem> = (0u32..(1 << universe.len()))
            .map(|mask| {
                let people: Vec<&str> = universe
                    .iter()
                    .enumerate()
                    .filter(|(bit, _)| mask & (1 << bit) != 0)
                    .map(|(_, p)| *p)
                    .collect();
                item(&format!("m{mask}"), &people)
            })
            .collect();

        for operation in [RequiredOperation::Any, RequiredOperation::All] {
            for exclusive in [false, true] {
                let rule = rule(&["P1", "P2"])
                    .with_operation(operation)
                    .excluding(["P3"])
                    .exclusive(exclusive);

                for selected in select(&items, &rule) {
                    assert!(!selected.person_ids.contains("P3"));
                    if exclusive {
                        assert!(selected.person_ids.is_subset(rule.required()));
                    }
                    if operation == RequiredOperation::All {
                        assert!(selected.person_ids.is_superset(rule.required()));
                    }
                }
            }
        }
    }
}
