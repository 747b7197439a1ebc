use crate::dnd::{DropHover, DropLocation, DropSite};
use crate::errors::DropRejection;
use crate::id::ItemId;

/// Result of a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// A `before` hook cancelled the operation.
    Vetoed,
    /// The addressed item does not exist.
    NotFound,
    /// The item exists but there was nothing to change.
    Unchanged,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Mutation intents a host can feed to [`TreeEngine::dispatch`].
///
/// [`TreeEngine::dispatch`]: crate::TreeEngine::dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum TreeIntent<T> {
    Create {
        parent_id: Option<ItemId>,
    },
    AddChild {
        id: ItemId,
    },
    Delete {
        id: ItemId,
    },
    Update {
        item: T,
    },
    Move {
        source: ItemId,
        target: Option<ItemId>,
        location: DropLocation,
    },
    Toggle {
        id: ItemId,
    },
    Select {
        id: ItemId,
        selected: bool,
    },
    Click {
        id: ItemId,
    },
}

/// Pointer events of a drag gesture, fed to [`TreeEngine::drag`].
///
/// [`TreeEngine::drag`]: crate::TreeEngine::drag
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    Start { element_id: String },
    Over { site: DropSite },
    Leave,
    Drop { site: DropSite },
    Cancel,
}

/// Engine answer to a [`DragEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum DragResponse {
    Started(ItemId),
    Hover(DropHover),
    Left,
    Dropped(MutationOutcome),
    Rejected(DropRejection),
    Cancelled,
}
