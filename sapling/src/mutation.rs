//! Synchronous collection edits applied once a hook pipeline lets a mutation
//! through. Each edit either fully applies or leaves the sequence untouched.

use std::collections::HashSet;

use crate::dnd::DropLocation;
use crate::fields::FieldAccessor;
use crate::id::ItemId;
use crate::index::TreeIndex;

/// Items taken out of the collection by a cascading delete.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Removed<T> {
    pub(crate) item: T,
    pub(crate) ids: Vec<ItemId>,
}

/// Remove `id` and every transitive descendant, keeping the order of the
/// remaining items.
pub(crate) fn remove_subtree<T: Clone>(
    items: &mut Vec<T>,
    fields: &FieldAccessor<T>,
    id: &ItemId,
) -> Option<Removed<T>> {
    let (item, mut ids) = {
        let index = TreeIndex::new(items, fields);
        let item = index.find(id)?.clone();
        (item, index.descendants(id))
    };
    ids.insert(0, id.clone());

    let doomed: HashSet<&ItemId> = ids.iter().collect();
    items.retain(|entry| {
        fields
            .id(entry)
            .is_none_or(|entry_id| !doomed.contains(&entry_id))
    });
    Some(Removed { item, ids })
}

/// Replace the stored item carrying the same id, in place.
pub(crate) fn replace<T: Clone>(
    items: &mut [T],
    fields: &FieldAccessor<T>,
    item: T,
) -> Option<T> {
    let id = fields.id(&item)?;
    let position = TreeIndex::new(items, fields).position(&id)?;
    items[position] = item.clone();
    Some(item)
}

/// Reparent and reorder `source` relative to `target`.
///
/// Without a target the item becomes a root appended after every other item.
/// `Above` and `Below` insert next to the target and adopt its parent;
/// `AsChild` appends the item after everything else under the target.
/// Returns the moved item, or `None` when the source or target is missing or
/// the move would create a cycle.
pub(crate) fn reposition<T: Clone>(
    items: &mut Vec<T>,
    fields: &FieldAccessor<T>,
    source: &ItemId,
    target: Option<(&ItemId, DropLocation)>,
) -> Option<T> {
    let (from, new_parent) = {
        let index = TreeIndex::new(items, fields);
        let from = index.position(source)?;
        let new_parent = match target {
            None => None,
            Some((target_id, _)) if target_id == source => return None,
            Some((target_id, DropLocation::AsChild)) => {
                index.position(target_id)?;
                Some(target_id.clone())
            },
            Some((target_id, _)) => {
                let at = index.position(target_id)?;
                fields.parent_id(&items[at])
            },
        };
        if let Some(parent) = &new_parent {
            if parent == source || index.is_descendant(parent, source) {
                return None;
            }
        }
        (from, new_parent)
    };

    let mut moved = items.remove(from);
    fields.set_parent_id(&mut moved, new_parent);

    let at = match target {
        Some((target_id, DropLocation::Above)) => {
            slot_of(items, fields, target_id)
        },
        Some((target_id, DropLocation::Below)) => {
            slot_of(items, fields, target_id) + 1
        },
        _ => items.len(),
    };
    items.insert(at.min(items.len()), moved.clone());
    Some(moved)
}

fn slot_of<T>(items: &[T], fields: &FieldAccessor<T>, id: &ItemId) -> usize {
    TreeIndex::new(items, fields)
        .position(id)
        .unwrap_or(items.len())
}
