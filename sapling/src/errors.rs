use thiserror::Error;

use crate::id::ItemId;

/// Errors emitted while building tree options or an engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Field name for `{field}` must not be empty.")]
    EmptyFieldName { field: &'static str },
    #[error("Field name `{name}` is mapped to more than one field.")]
    DuplicateFieldName { name: String },
    #[error("Maximum depth must be a positive number.")]
    ZeroMaxDepth,
    #[error("Accessor for `{0}` is missing.")]
    MissingAccessor(&'static str),
}

/// Structural problems found in a tree collection.
///
/// These are caller invariants: the engine never checks them implicitly, but
/// every traversal is bounded so a broken collection cannot hang it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("Item id `{id}` is used more than once.")]
    DuplicateId { id: ItemId },
    #[error("Item `{id}` references missing parent `{parent}`.")]
    DanglingParent { id: ItemId, parent: ItemId },
    #[error("Parent chain of item `{id}` is cyclic.")]
    Cycle { id: ItemId },
}

/// Reasons a drag-over position or a drop is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropRejection {
    #[error("No drag gesture is in progress.")]
    NoActiveDrag,
    #[error("Drop geometry is degenerate.")]
    InvalidGeometry,
    #[error("Dragged element cannot be identified.")]
    MissingSource,
    #[error("Drop target cannot be identified.")]
    MissingTarget,
    #[error("Dragged item `{id}` no longer exists.")]
    UnknownSource { id: ItemId },
    #[error("Drop target `{id}` no longer exists.")]
    UnknownTarget { id: ItemId },
    #[error("An item cannot be dropped onto itself.")]
    SameItem,
    #[error("An item cannot be moved into its own subtree.")]
    IntoOwnSubtree,
    #[error("Drop would place the item at depth {depth} (maximum {max}).")]
    DepthExceeded { depth: usize, max: usize },
    #[error("Only a single root item is allowed.")]
    SecondRoot,
    #[error("Move was vetoed by a hook.")]
    Vetoed,
}
