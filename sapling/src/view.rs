//! Derived shapes of the flat collection: the rows a host renders and the
//! nested projection.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::fields::{FieldAccessor, FieldNames, Record};
use crate::id::ItemId;
use crate::index::TreeIndex;

/// One rendered row of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRow<T> {
    pub id: ItemId,
    pub item: T,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
}

impl<T> VisibleRow<T> {
    /// Element id the host should tag the row with for drag events.
    pub fn element_id(&self) -> String {
        self.id.element_id()
    }
}

/// Node of the nested projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    pub item: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode<T>>,
}

impl<T> Drop for TreeNode<T> {
    // Unlinks children level by level so deep chains drop without recursion.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Rows to render: top-level items, then the children of every expanded
/// item, depth first in collection order.
///
/// Items whose parent cannot be resolved are listed at the top level.
pub(crate) fn flatten_visible<T: Clone>(
    index: &TreeIndex<'_, T>,
    is_open: impl Fn(&T, &ItemId) -> bool,
    selected: Option<&ItemId>,
) -> Vec<VisibleRow<T>> {
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut pending: Vec<(&T, usize)> = top_level(index)
        .into_iter()
        .rev()
        .map(|item| (item, 0))
        .collect();

    while let Some((item, depth)) = pending.pop() {
        let Some(id) = index.fields().id(item) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let has_children = index.has_children(item);
        let expanded = has_children && is_open(item, &id);
        if expanded {
            let children = index.children_of(&id);
            pending.extend(
                children.into_iter().rev().map(|child| (child, depth + 1)),
            );
        }
        rows.push(VisibleRow {
            selected: selected == Some(&id),
            id,
            item: item.clone(),
            depth,
            has_children,
            expanded,
        });
    }
    rows
}

/// Build the nested projection of the collection.
pub fn nest<T: Clone>(
    items: &[T],
    fields: &FieldAccessor<T>,
) -> Vec<TreeNode<T>> {
    let index = TreeIndex::new(items, fields);
    assemble(&index, |item, children| TreeNode {
        item: item.clone(),
        children,
    })
}

/// Fold the tree bottom up with `make`, parents after their children.
///
/// Items are first listed depth first with the slot of their parent, then
/// assembled in reverse so every child is built before its parent.
fn assemble<T, N>(
    index: &TreeIndex<'_, T>,
    mut make: impl FnMut(&T, Vec<N>) -> N,
) -> Vec<N> {
    let mut order: Vec<(&T, Option<usize>)> = Vec::new();
    let mut seen = HashSet::new();
    let mut pending: Vec<(&T, Option<usize>)> = top_level(index)
        .into_iter()
        .rev()
        .map(|item| (item, None))
        .collect();
    while let Some((item, parent)) = pending.pop() {
        let Some(id) = index.fields().id(item) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let slot = order.len();
        order.push((item, parent));
        let children = index.children_of(&id);
        pending.extend(
            children.into_iter().rev().map(|child| (child, Some(slot))),
        );
    }

    let mut built: Vec<Vec<N>> = order.iter().map(|_| Vec::new()).collect();
    let mut roots = Vec::new();
    for (slot, (item, parent)) in order.into_iter().enumerate().rev() {
        // Siblings arrive last first.
        let mut children = std::mem::take(&mut built[slot]);
        children.reverse();
        let node = make(item, children);
        match parent {
            Some(parent) => built[parent].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();
    roots
}

fn top_level<'a, T>(index: &TreeIndex<'a, T>) -> Vec<&'a T> {
    index
        .items()
        .iter()
        .filter(|item| index.parent(item).is_none())
        .collect()
}

/// Nested records with children stored under the configured `children` key.
pub fn nest_records(items: &[Record], names: &FieldNames) -> Vec<Record> {
    let fields = FieldAccessor::from_names(names);
    let index = TreeIndex::new(items, &fields);
    assemble(&index, |item: &Record, children: Vec<Record>| {
        let mut record = item.clone();
        if !children.is_empty() {
            let children = children.into_iter().map(Value::Object).collect();
            record.insert(names.children.clone(), Value::Array(children));
        }
        record
    })
}

/// Flatten nested records into the canonical flat shape.
///
/// Children are read from the configured `children` key and removed from
/// their parent; each child's parent id is set from its nesting. Items are
/// emitted parent first.
pub fn flatten_records(nested: Vec<Record>, names: &FieldNames) -> Vec<Record> {
    let fields = FieldAccessor::from_names(names);
    let mut flat = Vec::new();
    let mut pending: Vec<(Record, Option<ItemId>)> = nested
        .into_iter()
        .rev()
        .map(|record| (record, None))
        .collect();

    while let Some((mut record, parent)) = pending.pop() {
        let children = match record.remove(names.children.as_str()) {
            Some(Value::Array(children)) => children,
            _ => Vec::new(),
        };
        if parent.is_some() {
            fields.set_parent_id(&mut record, parent);
        }
        let id = fields.id(&record);
        flat.push(record);

        pending.extend(children.into_iter().rev().filter_map(|child| {
            match child {
                Value::Object(child) => Some((child, id.clone())),
                _ => None,
            }
        }));
    }
    flat
}
