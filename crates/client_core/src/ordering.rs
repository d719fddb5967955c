//! Integer `order` maintenance within a sibling scope.
//!
//! Orders are never patched incrementally. After a reorder the final rendered
//! sequence is read back and every sibling is rewritten to its index, in one
//! atomic batch.

use std::collections::{BTreeMap, HashSet};

use serde_json::json;
use shared::{domain::Ordered, paths::CollectionPath};
use storage::{Fields, WriteBatch};

pub const ORDER_FIELD: &str = "order";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAssignment<Id> {
    pub id: Id,
    pub order: u32,
}

/// `order` for a new sibling appended after `sibling_count` existing ones.
pub fn append_order(sibling_count: usize) -> u32 {
    u32::try_from(sibling_count).unwrap_or(u32::MAX)
}

/// Assigns `order = index` following the final rendered sequence. Repeated ids
/// keep their first position.
pub fn reindex<Id>(final_order: &[Id]) -> Vec<OrderAssignment<Id>>
where
    Id: Clone + Eq + std::hash::Hash,
{
    let mut seen = HashSet::with_capacity(final_order.len());
    final_order
        .iter()
        .filter(|id| seen.insert(*id))
        .enumerate()
        .map(|(index, id)| OrderAssignment {
            id: id.clone(),
            order: append_order(index),
        })
        .collect()
}

pub fn order_fields(order: u32) -> Fields {
    let mut fields = Fields::new();
    fields.insert(ORDER_FIELD.to_string(), json!(order));
    fields
}

/// One update per sibling, all in the same batch.
pub fn reindex_batch<Id>(collection: &CollectionPath, final_order: &[Id]) -> WriteBatch
where
    Id: Clone + Eq + std::hash::Hash + AsRef<str>,
{
    let mut batch = WriteBatch::new();
    for assignment in reindex(final_order) {
        batch.update(collection.doc(&assignment.id), order_fields(assignment.order));
    }
    batch
}

/// Ascending by `order`, equal values by store id.
pub fn sort_siblings<T: Ordered>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.order()
            .cmp(&b.order())
            .then_with(|| a.sort_key().cmp(b.sort_key()))
    });
}

/// Local echo of a committed reindex: listed items take their new index,
/// the rest keep their current value, then the scope is re-sorted.
pub fn apply_local_order<T, Id>(
    items: &mut [T],
    final_order: &[Id],
    id_of: impl Fn(&T) -> &Id,
    set_order: impl Fn(&mut T, u32),
) where
    T: Ordered,
    Id: Clone + Eq + std::hash::Hash,
{
    let assigned: BTreeMap<usize, u32> = reindex(final_order)
        .into_iter()
        .filter_map(|assignment| {
            items
                .iter()
                .position(|item| id_of(item) == &assignment.id)
                .map(|index| (index, assignment.order))
        })
        .collect();
    for (index, order) in assigned {
        set_order(&mut items[index], order);
    }
    sort_siblings(items);
}

/// Moves one element, returning false when either index is out of range.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderAudit {
    /// Order values held by more than one sibling.
    pub duplicates: Vec<u32>,
    /// Values in `0..n` that no sibling holds.
    pub missing: Vec<u32>,
}

impl OrderAudit {
    pub fn is_dense(&self) -> bool {
        self.duplicates.is_empty() && self.missing.is_empty()
    }
}

pub fn audit<T: Ordered>(items: &[T]) -> OrderAudit {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item.order()).or_default() += 1;
    }
    OrderAudit {
        duplicates: counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(order, _)| *order)
            .collect(),
        missing: (0..append_order(items.len()))
            .filter(|order| !counts.contains_key(order))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::domain::{CategoryId, ListId, Category};
    use storage::WriteOp;

    use super::*;

    fn category(id: &str, order: u32) -> Category {
        Category {
            id: CategoryId::new(id),
            list_id: ListId::new("l1"),
            name: id.to_string(),
            order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reindex_assigns_dense_orders_in_rendered_sequence() {
        for n in 0..12 {
            let ids: Vec<String> = (0..n).rev().map(|i| format!("id{i}")).collect();
            let assignments = reindex(&ids);
            assert_eq!(assignments.len(), n);
            for (index, assignment) in assignments.iter().enumerate() {
                assert_eq!(assignment.id, ids[index]);
                assert_eq!(assignment.order as usize, index);
            }
        }
    }

    #[test]
    fn reindex_is_idempotent() {
        let ids = vec!["science", "math", "art"];
        assert_eq!(reindex(&ids), reindex(&ids));

        let collection = CollectionPath::parse("users/u1/lists/l1/categories").expect("path");
        assert_eq!(reindex_batch(&collection, &ids), reindex_batch(&collection, &ids));
    }

    #[test]
    fn reindex_skips_repeated_ids() {
        let assignments = reindex(&["a", "b", "a", "c"]);
        let orders: Vec<(&str, u32)> = assignments.iter().map(|a| (a.id, a.order)).collect();
        assert_eq!(orders, vec![("a", 0), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn dragging_science_above_math_rewrites_both_in_one_batch() {
        let collection = CollectionPath::parse("users/u1/lists/l1/categories").expect("path");
        let batch = reindex_batch(&collection, &[CategoryId::new("science"), CategoryId::new("math")]);
        assert_eq!(batch.len(), 2);
        match &batch.ops()[0] {
            WriteOp::Update { path, fields } => {
                assert_eq!(path.id(), "science");
                assert_eq!(fields[ORDER_FIELD], json!(0));
            }
            other => panic!("unexpected op {other:?}"),
        }
        match &batch.ops()[1] {
            WriteOp::Update { path, fields } => {
                assert_eq!(path.id(), "math");
                assert_eq!(fields[ORDER_FIELD], json!(1));
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn sort_breaks_order_ties_by_id() {
        let mut items = vec![category("b", 1), category("c", 0), category("a", 1)];
        sort_siblings(&mut items);
        let ids: Vec<&str> = items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn local_order_matches_reindexed_sequence() {
        let mut items = vec![category("math", 0), category("science", 1), category("art", 2)];
        let order = [CategoryId::new("art"), CategoryId::new("math"), CategoryId::new("science")];
        apply_local_order(&mut items, &order, |c| &c.id, |c, o| c.order = o);
        let seen: Vec<(&str, u32)> = items.iter().map(|c| (c.id.as_str(), c.order)).collect();
        assert_eq!(seen, vec![("art", 0), ("math", 1), ("science", 2)]);
    }

    #[test]
    fn move_item_rejects_out_of_range() {
        let mut items = vec!['a', 'b', 'c'];
        assert!(move_item(&mut items, 2, 0));
        assert_eq!(items, vec!['c', 'a', 'b']);
        assert!(!move_item(&mut items, 3, 0));
        assert_eq!(items, vec!['c', 'a', 'b']);
    }

    #[test]
    fn audit_reports_collisions_and_gaps() {
        let items = vec![category("a", 0), category("b", 0), category("c", 3)];
        let report = audit(&items);
        assert_eq!(report.duplicates, vec![0]);
        assert_eq!(report.missing, vec![1, 2]);
        assert!(!report.is_dense());
        assert!(audit(&[category("a", 0), category("b", 1)]).is_dense());
    }
}
