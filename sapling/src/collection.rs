use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to the flat, ordered item sequence of a tree.
///
/// Clones point at the same storage, so a host can keep a handle and observe
/// every mutation the engine applies in place.
pub struct TreeCollection<T> {
    items: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for TreeCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TreeCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.read().iter()).finish()
    }
}

impl<T> Default for TreeCollection<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> From<Vec<T>> for TreeCollection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> FromIterator<T> for TreeCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> TreeCollection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read()
    }

    /// Exclusive access. Never hold the guard across an `.await`.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.items.write()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T: Clone> TreeCollection<T> {
    /// Copy of the current sequence.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }
}
