use std::collections::HashMap;

use crate::dnd::{DragSession, DropHover};
use crate::id::ItemId;

/// Interaction state of one engine: selection, drag gesture, ephemeral
/// expansion flags and the re-render flag.
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineState {
    selected: Option<ItemId>,
    drag: DragSession,
    open: HashMap<ItemId, bool>,
    dirty: bool,
}

impl EngineState {
    // --- Selection ---

    pub(crate) fn selected(&self) -> Option<&ItemId> {
        self.selected.as_ref()
    }

    pub(crate) fn set_selected(&mut self, id: Option<ItemId>) {
        self.selected = id;
        self.dirty = true;
    }

    // --- Drag ---

    pub(crate) fn drag(&self) -> &DragSession {
        &self.drag
    }

    pub(crate) fn start_drag(&mut self, source: ItemId) {
        self.drag = DragSession::Dragging {
            source,
            hover: None,
        };
        self.dirty = true;
    }

    /// Record hover feedback, as long as `source` is still being dragged.
    pub(crate) fn set_hover(&mut self, source: &ItemId, next: DropHover) {
        if let DragSession::Dragging {
            source: current,
            hover,
        } = &mut self.drag
        {
            if current == source {
                *hover = Some(next);
                self.dirty = true;
            }
        }
    }

    pub(crate) fn clear_hover(&mut self) {
        if let DragSession::Dragging { hover, .. } = &mut self.drag {
            if hover.take().is_some() {
                self.dirty = true;
            }
        }
    }

    /// Finish the gesture and hand back what it was.
    pub(crate) fn end_drag(&mut self) -> DragSession {
        let session = std::mem::take(&mut self.drag);
        if session.is_dragging() {
            self.dirty = true;
        }
        session
    }

    // --- Expansion ---

    pub(crate) fn open_flags(&self) -> &HashMap<ItemId, bool> {
        &self.open
    }

    pub(crate) fn open_flags_mut(&mut self) -> &mut HashMap<ItemId, bool> {
        &mut self.open
    }

    /// Drop everything the state remembers about removed items.
    pub(crate) fn forget(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.open.remove(id);
        }
        if self.selected.as_ref().is_some_and(|id| ids.contains(id)) {
            self.selected = None;
        }
        if self.drag.source().is_some_and(|id| ids.contains(id)) {
            self.drag = DragSession::Idle;
        }
    }

    // --- Dirty ---

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
