//! Read-only lookups over a flat tree collection.
//!
//! Every traversal is bounded by the collection size, so cyclic or dangling
//! parent chains terminate instead of looping.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::IntegrityError;
use crate::fields::FieldAccessor;
use crate::id::ItemId;

/// Borrowed view answering structural questions about a collection.
///
/// Building the view hashes every id and parent id once; lookups by id are
/// constant time afterwards.
#[derive(Debug)]
pub struct TreeIndex<'a, T> {
    items: &'a [T],
    fields: &'a FieldAccessor<T>,
    positions: HashMap<ItemId, usize>,
    children: HashMap<ItemId, Vec<usize>>,
}

impl<'a, T> TreeIndex<'a, T> {
    pub fn new(items: &'a [T], fields: &'a FieldAccessor<T>) -> Self {
        let mut positions = HashMap::with_capacity(items.len());
        let mut children: HashMap<ItemId, Vec<usize>> = HashMap::new();
        for (at, item) in items.iter().enumerate() {
            if let Some(id) = fields.id(item) {
                positions.entry(id).or_insert(at);
            }
            if let Some(parent) = fields.parent_id(item) {
                children.entry(parent).or_default().push(at);
            }
        }
        Self {
            items,
            fields,
            positions,
            children,
        }
    }

    pub fn items(&self) -> &'a [T] {
        self.items
    }

    pub fn fields(&self) -> &'a FieldAccessor<T> {
        self.fields
    }

    /// Locate the item with the given id. Blank ids never match.
    pub fn find(&self, id: &ItemId) -> Option<&'a T> {
        let items = self.items;
        self.position(id).map(|at| &items[at])
    }

    /// Position of the item with the given id in collection order. With
    /// duplicate ids the first occurrence wins.
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        if id.is_blank() {
            return None;
        }
        self.positions.get(id).copied()
    }

    /// Resolve the parent of an item, if it has one that exists.
    pub fn parent(&self, item: &T) -> Option<&'a T> {
        self.fields
            .parent_id(item)
            .and_then(|parent| self.find(&parent))
    }

    /// Items without a parent, in collection order.
    pub fn roots(&self) -> Vec<&'a T> {
        self.items
            .iter()
            .filter(|item| self.fields.is_root(item))
            .collect()
    }

    /// Direct children of an item, in collection order.
    pub fn children(&self, item: &T) -> Vec<&'a T> {
        match self.fields.id(item) {
            Some(id) => self.children_of(&id),
            None => Vec::new(),
        }
    }

    /// Direct children of the item with the given id.
    pub fn children_of(&self, id: &ItemId) -> Vec<&'a T> {
        let items = self.items;
        self.children
            .get(id)
            .map(|slots| slots.iter().map(|&at| &items[at]).collect())
            .unwrap_or_default()
    }

    pub fn has_children(&self, item: &T) -> bool {
        self.fields
            .id(item)
            .is_some_and(|id| self.children.contains_key(&id))
    }

    /// Depth of an item: `0` for a root, `1 + depth(parent)` otherwise.
    ///
    /// An unresolved parent ends the chain. A cyclic chain stops after as
    /// many hops as there are items.
    pub fn depth(&self, item: &T) -> usize {
        self.ancestors(item).len()
    }

    /// Ancestors of an item, nearest first.
    pub fn ancestors(&self, item: &T) -> Vec<&'a T> {
        let mut chain = Vec::new();
        let mut current = self.parent(item);
        while let Some(parent) = current {
            if chain.len() >= self.items.len() {
                break;
            }
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    /// Ids of every transitive descendant of `id`, breadth first.
    pub fn descendants(&self, id: &ItemId) -> Vec<ItemId> {
        let mut seen: HashSet<ItemId> = HashSet::from([id.clone()]);
        let mut queue: VecDeque<ItemId> = VecDeque::from([id.clone()]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for child in self.children_of(&current) {
                let Some(child_id) = self.fields.id(child) else {
                    continue;
                };
                if seen.insert(child_id.clone()) {
                    found.push(child_id.clone());
                    queue.push_back(child_id);
                }
            }
        }
        found
    }

    /// Return whether `candidate` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, candidate: &ItemId, ancestor: &ItemId) -> bool {
        let Some(item) = self.find(candidate) else {
            return false;
        };
        self.ancestors(item)
            .iter()
            .any(|parent| self.fields.id(parent).as_ref() == Some(ancestor))
    }

    /// Report the first structural problem in the collection.
    ///
    /// Every parent chain is walked at most once: chains that reached a
    /// root are remembered and cut short later walks.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut seen = HashSet::new();
        for item in self.items {
            let Some(id) = self.fields.id(item) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                return Err(IntegrityError::DuplicateId { id });
            }
        }

        let mut settled: HashSet<ItemId> = HashSet::new();
        for item in self.items {
            let Some(id) = self.fields.id(item) else {
                continue;
            };
            let Some(parent) = self.fields.parent_id(item) else {
                settled.insert(id);
                continue;
            };
            if self.find(&parent).is_none() {
                return Err(IntegrityError::DanglingParent { id, parent });
            }

            let mut path = HashSet::new();
            let mut current = Some(id.clone());
            while let Some(step) = current {
                if settled.contains(&step) {
                    break;
                }
                if !path.insert(step.clone()) {
                    return Err(IntegrityError::Cycle { id });
                }
                current = self
                    .find(&step)
                    .and_then(|found| self.fields.parent_id(found));
            }
            settled.extend(path);
        }
        Ok(())
    }
}
