//! Drag-and-drop: drop-zone classification and structural validation of a
//! prospective drop.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::DropRejection;
use crate::id::{ELEMENT_ID_PREFIX, ItemId};
use crate::index::TreeIndex;

/// Where a dragged item lands relative to the hovered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropLocation {
    /// Sibling placed right before the target.
    Above,
    /// Sibling placed right after the target.
    Below,
    /// Last child of the target.
    AsChild,
}

/// Vertical geometry of a hovered row, in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropGeometry {
    pub top: f32,
    pub height: f32,
    pub pointer_y: f32,
}

impl DropGeometry {
    pub fn new(top: f32, height: f32, pointer_y: f32) -> Self {
        Self {
            top,
            height,
            pointer_y,
        }
    }

    /// Split the row into thirds: top is `Above`, middle is `AsChild`,
    /// bottom is `Below`. A pointer outside the row clamps to the nearest
    /// edge.
    ///
    /// Returns `None` for non-finite values or a row without height.
    pub fn classify(&self) -> Option<DropLocation> {
        let finite = self.top.is_finite()
            && self.height.is_finite()
            && self.pointer_y.is_finite();
        if !finite || self.height <= 0.0 {
            return None;
        }

        let ratio = (self.pointer_y - self.top) / self.height;
        let location = if ratio < 1.0 / 3.0 {
            DropLocation::Above
        } else if ratio < 2.0 / 3.0 {
            DropLocation::AsChild
        } else {
            DropLocation::Below
        };
        Some(location)
    }
}

/// What the pointer is over while dragging.
#[derive(Debug, Clone, PartialEq)]
pub enum DropSite {
    /// A rendered row, tagged with its element id.
    Item {
        element_id: String,
        geometry: DropGeometry,
    },
    /// The tree container outside of any row.
    Container,
    /// Nothing the tree can identify.
    Unknown,
}

impl DropSite {
    pub fn item(element_id: impl Into<String>, geometry: DropGeometry) -> Self {
        Self::Item {
            element_id: element_id.into(),
            geometry,
        }
    }
}

/// Resolved destination of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Root,
    Item { id: ItemId, location: DropLocation },
}

impl DropTarget {
    pub fn location(&self) -> Option<DropLocation> {
        match self {
            Self::Root => None,
            Self::Item { location, .. } => Some(*location),
        }
    }
}

/// Hover feedback for the host's drop affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropHover {
    pub target: DropTarget,
    pub rejection: Option<DropRejection>,
}

impl DropHover {
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

/// State of the current drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging {
        source: ItemId,
        hover: Option<DropHover>,
    },
}

impl DragSession {
    pub fn source(&self) -> Option<&ItemId> {
        match self {
            Self::Idle => None,
            Self::Dragging { source, .. } => Some(source),
        }
    }

    pub fn hover(&self) -> Option<&DropHover> {
        match self {
            Self::Idle => None,
            Self::Dragging { hover, .. } => hover.as_ref(),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }
}

/// Limits a drop has to respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DropLimits {
    pub(crate) max_depth: Option<usize>,
    pub(crate) multiple_roots: bool,
}

/// A drop that passed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DropPlan {
    pub(crate) source: ItemId,
    pub(crate) target: DropTarget,
    pub(crate) new_parent: Option<ItemId>,
}

/// Map a host element id onto an item id.
///
/// Numeric text is tried as a number first, then as text, so items keyed by
/// numeric strings still resolve.
pub(crate) fn resolve_element_id<T>(
    index: &TreeIndex<'_, T>,
    element_id: &str,
) -> Option<ItemId> {
    let parsed = ItemId::from_element_id(element_id)?;
    if index.find(&parsed).is_some() {
        return Some(parsed);
    }
    let raw = element_id
        .strip_prefix(ELEMENT_ID_PREFIX)
        .unwrap_or(element_id);
    let text = ItemId::from(raw);
    if index.find(&text).is_some() {
        return Some(text);
    }
    Some(parsed)
}

/// Turn a drop site into a target.
pub(crate) fn resolve_site<T>(
    index: &TreeIndex<'_, T>,
    site: &DropSite,
) -> Result<DropTarget, DropRejection> {
    match site {
        DropSite::Item {
            element_id,
            geometry,
        } => {
            let id = resolve_element_id(index, element_id)
                .ok_or(DropRejection::MissingTarget)?;
            let location =
                geometry.classify().ok_or(DropRejection::InvalidGeometry)?;
            Ok(DropTarget::Item { id, location })
        },
        DropSite::Container => Ok(DropTarget::Root),
        DropSite::Unknown => Err(DropRejection::MissingTarget),
    }
}

/// Parent the source would get when dropped on `target`.
pub(crate) fn prospective_parent<T>(
    index: &TreeIndex<'_, T>,
    target: &DropTarget,
) -> Option<ItemId> {
    match target {
        DropTarget::Root => None,
        DropTarget::Item {
            id,
            location: DropLocation::AsChild,
        } => Some(id.clone()),
        DropTarget::Item { id, .. } => index
            .find(id)
            .and_then(|item| index.fields().parent_id(item)),
    }
}

/// Validate a drop against the current collection.
pub(crate) fn plan_drop<T>(
    index: &TreeIndex<'_, T>,
    source: &ItemId,
    target: &DropTarget,
    limits: DropLimits,
) -> Result<DropPlan, DropRejection> {
    let fields = index.fields();
    let source_item = index
        .find(source)
        .ok_or_else(|| DropRejection::UnknownSource { id: source.clone() })?;

    if let DropTarget::Item { id, .. } = target {
        if id == source {
            return Err(DropRejection::SameItem);
        }
        if index.find(id).is_none() {
            return Err(DropRejection::UnknownTarget { id: id.clone() });
        }
    }

    let new_parent = prospective_parent(index, target);
    if let Some(parent) = &new_parent {
        if parent == source || index.is_descendant(parent, source) {
            return Err(DropRejection::IntoOwnSubtree);
        }
    }

    if let Some(max) = limits.max_depth {
        let depth = new_parent
            .as_ref()
            .and_then(|parent| index.find(parent))
            .map(|parent| index.depth(parent) + 1)
            .unwrap_or(0);
        let deepest = depth + subtree_height(index, source);
        if deepest > max {
            return Err(DropRejection::DepthExceeded {
                depth: deepest,
                max,
            });
        }
    }

    if !limits.multiple_roots
        && new_parent.is_none()
        && !fields.is_root(source_item)
        && !index.roots().is_empty()
    {
        return Err(DropRejection::SecondRoot);
    }

    Ok(DropPlan {
        source: source.clone(),
        target: target.clone(),
        new_parent,
    })
}

/// Levels below `id` in its own subtree, counted one generation at a time.
fn subtree_height<T>(index: &TreeIndex<'_, T>, id: &ItemId) -> usize {
    let fields = index.fields();
    let mut seen = HashSet::from([id.clone()]);
    let mut level = vec![id.clone()];
    let mut height = 0;
    loop {
        let next: Vec<ItemId> = level
            .iter()
            .flat_map(|parent| index.children_of(parent))
            .filter_map(|child| fields.id(child))
            .filter(|child| seen.insert(child.clone()))
            .collect();
        if next.is_empty() {
            return height;
        }
        height += 1;
        level = next;
    }
}
