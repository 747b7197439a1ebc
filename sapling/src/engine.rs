//! The tree engine: mutations gated by hooks, expansion, selection and the
//! drag-and-drop state machine over one shared collection.

use std::fmt;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::collection::TreeCollection;
use crate::dnd::{
    DragSession, DropHover, DropLimits, DropLocation, DropPlan, DropSite,
    DropTarget, plan_drop, resolve_element_id, resolve_site,
};
use crate::errors::{ConfigError, DropRejection, IntegrityError};
use crate::event::{DragEvent, DragResponse, MutationOutcome, TreeIntent};
use crate::expand::OpenStore;
use crate::fields::{DEFAULT_ITEM_NAME, FieldAccessor};
use crate::hooks::{
    CreateFactory, HookContext, Hooks, PipelineOutcome, UpdateAction,
};
use crate::id::ItemId;
use crate::index::TreeIndex;
use crate::logging::EngineLog;
use crate::mutation;
use crate::options::{TreeConfig, TreeOptions};
use crate::state::EngineState;
use crate::view::{self, TreeNode, VisibleRow};

/// Mutation and reordering engine over a flat tree collection.
///
/// All methods take `&self`; share the engine behind an `Arc` to drive it
/// from several tasks. Locks are only held inside synchronous sections, so
/// a pending hook never blocks other operations.
pub struct TreeEngine<T> {
    collection: TreeCollection<T>,
    config: TreeConfig,
    fields: FieldAccessor<T>,
    open_store: OpenStore<T>,
    hooks: Hooks<T>,
    factory: Option<CreateFactory<T>>,
    state: Mutex<EngineState>,
    log: EngineLog,
}

impl<T> fmt::Debug for TreeEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeEngine")
            .field("config", &self.config)
            .field("open_store", &self.open_store)
            .field("hooks", &self.hooks)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> TreeEngine<T> {
    /// Attach an engine to `collection`.
    ///
    /// Malformed options are rejected. Structural problems in the collection
    /// are only logged; every traversal stays bounded regardless.
    pub fn new(
        collection: TreeCollection<T>,
        options: TreeOptions<T>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let TreeOptions {
            config,
            fields,
            open_store,
            hooks,
            factory,
            logger,
        } = options;

        let engine = Self {
            log: EngineLog::new(config.logging, logger),
            collection,
            config,
            fields,
            open_store,
            hooks,
            factory,
            state: Mutex::new(EngineState::default()),
        };
        if let Err(err) = engine.check_integrity() {
            engine
                .log
                .warn(format_args!("tree collection is inconsistent: {err}"));
        }
        Ok(engine)
    }

    // --- Accessors ---

    pub fn collection(&self) -> &TreeCollection<T> {
        &self.collection
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldAccessor<T> {
        &self.fields
    }

    fn index<'a>(&'a self, items: &'a [T]) -> TreeIndex<'a, T> {
        TreeIndex::new(items, &self.fields)
    }

    fn limits(&self) -> DropLimits {
        DropLimits {
            max_depth: self.config.max_depth,
            multiple_roots: self.config.multiple_roots,
        }
    }

    // --- Queries ---

    pub fn find(&self, id: &ItemId) -> Option<T> {
        let items = self.collection.read();
        self.index(&items).find(id).cloned()
    }

    /// Direct children of `id`, in collection order.
    pub fn children(&self, id: &ItemId) -> Vec<T> {
        let items = self.collection.read();
        self.index(&items)
            .children_of(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn has_children(&self, id: &ItemId) -> bool {
        let items = self.collection.read();
        let index = self.index(&items);
        index.find(id).is_some_and(|item| index.has_children(item))
    }

    pub fn depth(&self, id: &ItemId) -> Option<usize> {
        let items = self.collection.read();
        let index = self.index(&items);
        index.find(id).map(|item| index.depth(item))
    }

    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let items = self.collection.read();
        self.index(&items).check_integrity()
    }

    /// Nested projection of the current collection.
    pub fn nested(&self) -> Vec<TreeNode<T>> {
        let items = self.collection.read();
        view::nest(&items, &self.fields)
    }

    /// Rows to render: top-level items and the children of expanded items.
    pub fn visible_rows(&self) -> Vec<VisibleRow<T>> {
        let items = self.collection.read();
        let state = self.state.lock();
        view::flatten_visible(
            &self.index(&items),
            |item, id| self.open_store.is_open(item, id, state.open_flags()),
            state.selected(),
        )
    }

    // --- Capabilities ---

    /// Whether a host should offer creating a child under `id`.
    pub fn can_create_child(&self, id: &ItemId) -> bool {
        if !self.config.editable.can_create {
            return false;
        }
        match (self.depth(id), self.config.max_depth) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(depth), Some(max)) => depth < max,
        }
    }

    pub fn can_create_root(&self) -> bool {
        if !self.config.editable.can_create {
            return false;
        }
        if self.config.multiple_roots {
            return true;
        }
        let items = self.collection.read();
        self.index(&items).roots().is_empty()
    }

    pub fn can_delete(&self, id: &ItemId) -> bool {
        let editable = self.config.editable;
        editable.can_delete
            && (editable.can_delete_parent || !self.has_children(id))
    }

    pub fn can_drag(&self) -> bool {
        self.config.editable.can_update
    }

    // --- State ---

    pub fn selected_id(&self) -> Option<ItemId> {
        self.state.lock().selected().cloned()
    }

    pub fn drag_session(&self) -> DragSession {
        self.state.lock().drag().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().is_dirty()
    }

    /// Consume the "state changed" flag.
    pub fn take_dirty(&self) -> bool {
        self.state.lock().take_dirty()
    }

    /// Forget selection, drag gesture and ephemeral expansion flags.
    pub fn reset_state(&self) {
        let mut state = self.state.lock();
        *state = EngineState::default();
        state.mark_dirty();
    }

    // --- Mutations ---

    /// Create an item under `parent_id`, or at the root when the id is
    /// absent or blank.
    ///
    /// The new item becomes selected and its parent is forced open.
    pub async fn create(&self, parent_id: Option<ItemId>) -> MutationOutcome {
        let parent_id = parent_id.and_then(ItemId::non_blank);
        let (parent, depth) = {
            let items = self.collection.read();
            let index = self.index(&items);
            match &parent_id {
                Some(id) => match index.find(id) {
                    Some(parent) => {
                        (Some(parent.clone()), Some(index.depth(parent) + 1))
                    },
                    None => {
                        self.log.debug(format_args!(
                            "create skipped: parent {id} not found"
                        ));
                        return MutationOutcome::NotFound;
                    },
                },
                None => (None, None),
            }
        };

        let item = match &self.factory {
            Some(factory) => factory(parent, depth).await,
            None => self.fields.compose(
                ItemId::Text(Uuid::new_v4().to_string()),
                parent_id.clone(),
                DEFAULT_ITEM_NAME,
            ),
        };

        // Selection is announced before `on_create`.
        let pipeline = self.hooks.create_pipeline();
        let ctx = HookContext::new(item);
        if !pipeline.gate(&ctx).await {
            let vetoed = PipelineOutcome::Vetoed;
            return self.settle("create", parent_id.as_ref(), vetoed);
        }
        let stored = {
            let mut items = self.collection.write();
            let parent_gone = parent_id
                .as_ref()
                .is_some_and(|id| self.index(&items).find(id).is_none());
            if parent_gone {
                None
            } else {
                items.push(ctx.item.clone());
                let mut state = self.state.lock();
                state.set_selected(self.fields.id(&ctx.item));
                if let Some(id) = &parent_id {
                    self.open_in(&mut items, &mut state, id);
                }
                Some(ctx.item.clone())
            }
        };
        let Some(item) = stored else {
            let missing = PipelineOutcome::Missing;
            return self.settle("create", parent_id.as_ref(), missing);
        };

        let id = self.fields.id(&item);
        self.log.debug(format_args!(
            "created item {} under {}",
            display(id.as_ref()),
            display(parent_id.as_ref())
        ));
        if let Some(on_select) = &self.hooks.on_select {
            on_select(item.clone(), true).await;
        }
        pipeline.notify(HookContext { item, ..ctx }).await;
        MutationOutcome::Applied
    }

    /// Create a child under an existing item.
    pub async fn add_child(&self, id: &ItemId) -> MutationOutcome {
        if self.find(id).is_none() {
            return MutationOutcome::NotFound;
        }
        self.create(Some(id.clone())).await
    }

    /// Delete `id` together with every transitive descendant.
    pub async fn delete(&self, id: &ItemId) -> MutationOutcome {
        let Some(item) = self.find(id) else {
            return MutationOutcome::NotFound;
        };

        let mut removed = 0;
        let outcome = self
            .hooks
            .delete_pipeline()
            .run(HookContext::new(item), |_| {
                let mut items = self.collection.write();
                let taken =
                    mutation::remove_subtree(&mut items, &self.fields, id)?;
                let mut state = self.state.lock();
                state.forget(&taken.ids);
                state.mark_dirty();
                removed = taken.ids.len();
                Some(taken.item)
            })
            .await;

        if matches!(outcome, PipelineOutcome::Applied(_)) {
            self.log
                .debug(format_args!("deleted {removed} item(s) under {id}"));
        }
        self.settle("delete", Some(id), outcome)
    }

    /// Replace the stored item with the same id, keeping its position.
    pub async fn update(&self, item: T) -> MutationOutcome {
        self.update_with(item, UpdateAction::Edit, None).await
    }

    /// Update with an explicit action and prospective parent passed to the
    /// update hooks.
    pub async fn update_with(
        &self,
        item: T,
        action: UpdateAction,
        new_parent: Option<T>,
    ) -> MutationOutcome {
        let Some(id) = self.fields.id(&item) else {
            return MutationOutcome::NotFound;
        };
        if self.find(&id).is_none() {
            return MutationOutcome::NotFound;
        }

        let outcome = self
            .hooks
            .update_pipeline()
            .run(HookContext::update(item, action, new_parent), |ctx| {
                let mut items = self.collection.write();
                let stored = mutation::replace(
                    &mut items,
                    &self.fields,
                    ctx.item.clone(),
                )?;
                self.state.lock().mark_dirty();
                Some(stored)
            })
            .await;
        self.settle("update", Some(&id), outcome)
    }

    /// Move `source` next to or under `target`; without a target the item
    /// becomes the last root.
    ///
    /// Depth limits are not enforced here; drops validate them first.
    pub async fn move_item(
        &self,
        source: &ItemId,
        target: Option<&ItemId>,
        location: DropLocation,
    ) -> MutationOutcome {
        let target = match target {
            Some(id) => DropTarget::Item {
                id: id.clone(),
                location,
            },
            None => DropTarget::Root,
        };
        self.move_to(source, &target).await
    }

    async fn move_to(
        &self,
        source: &ItemId,
        target: &DropTarget,
    ) -> MutationOutcome {
        let (item, new_parent) = {
            let items = self.collection.read();
            let index = self.index(&items);
            let Some(item) = index.find(source) else {
                return MutationOutcome::NotFound;
            };
            let new_parent = match target {
                DropTarget::Root => None,
                DropTarget::Item { id, .. } if id == source => {
                    return MutationOutcome::Unchanged;
                },
                DropTarget::Item { id, location } => {
                    let Some(anchor) = index.find(id) else {
                        return MutationOutcome::NotFound;
                    };
                    match location {
                        DropLocation::AsChild => Some(id.clone()),
                        _ => self.fields.parent_id(anchor),
                    }
                },
            };
            if let Some(parent) = &new_parent {
                if parent == source || index.is_descendant(parent, source) {
                    self.log.warn(format_args!(
                        "move of {source} rejected: {}",
                        DropRejection::IntoOwnSubtree
                    ));
                    return MutationOutcome::Unchanged;
                }
            }
            let new_parent = new_parent
                .and_then(|parent| index.find(&parent))
                .cloned();
            (item.clone(), new_parent)
        };

        let anchor = match target {
            DropTarget::Root => None,
            DropTarget::Item { id, location } => Some((id, *location)),
        };
        let outcome = self
            .hooks
            .update_pipeline()
            .run(
                HookContext::update(item, UpdateAction::Move, new_parent),
                |_| {
                    let mut items = self.collection.write();
                    let moved = mutation::reposition(
                        &mut items,
                        &self.fields,
                        source,
                        anchor,
                    )?;
                    self.state.lock().mark_dirty();
                    Some(moved)
                },
            )
            .await;

        if let PipelineOutcome::Applied(moved) = &outcome {
            self.log.debug(format_args!(
                "moved {source} under {}",
                display(self.fields.parent_id(moved).as_ref())
            ));
        }
        self.settle("move", Some(source), outcome)
    }

    fn settle(
        &self,
        operation: &str,
        id: Option<&ItemId>,
        outcome: PipelineOutcome<T>,
    ) -> MutationOutcome {
        match outcome {
            PipelineOutcome::Applied(_) => MutationOutcome::Applied,
            PipelineOutcome::Vetoed => {
                self.log.debug(format_args!(
                    "{operation} of {} vetoed by hook",
                    display(id)
                ));
                MutationOutcome::Vetoed
            },
            PipelineOutcome::Missing => {
                self.log.debug(format_args!(
                    "{operation} of {} found nothing after hook",
                    display(id)
                ));
                MutationOutcome::NotFound
            },
        }
    }

    // --- Selection ---

    /// Mark `id` selected or deselected and notify `on_select`.
    pub async fn select(&self, id: &ItemId, selected: bool) -> MutationOutcome {
        let Some(item) = self.find(id) else {
            return MutationOutcome::NotFound;
        };
        {
            let mut state = self.state.lock();
            if selected {
                state.set_selected(Some(id.clone()));
            } else if state.selected() == Some(id) {
                state.set_selected(None);
            }
        }
        if let Some(on_select) = &self.hooks.on_select {
            on_select(item, selected).await;
        }
        MutationOutcome::Applied
    }

    /// Toggle the selection of `id`, like clicking its row.
    pub async fn click(&self, id: &ItemId) -> MutationOutcome {
        let selected = self.selected_id().as_ref() == Some(id);
        self.select(id, !selected).await
    }

    // --- Expansion ---

    /// Flip the open flag of an item that has children.
    pub fn toggle(&self, id: &ItemId) -> MutationOutcome {
        let mut items = self.collection.write();
        let mut state = self.state.lock();
        let position = {
            let index = self.index(&items);
            let Some(position) = index.position(id) else {
                return MutationOutcome::NotFound;
            };
            if !index.has_children(&items[position]) {
                return MutationOutcome::Unchanged;
            }
            position
        };

        let open =
            self.open_store
                .is_open(&items[position], id, state.open_flags());
        self.open_store.set_open(
            &mut items[position],
            id,
            !open,
            state.open_flags_mut(),
        );
        state.mark_dirty();
        MutationOutcome::Applied
    }

    /// Whether the item has children and its open flag is set.
    pub fn is_expanded(&self, id: &ItemId) -> bool {
        let items = self.collection.read();
        let state = self.state.lock();
        let index = self.index(&items);
        index.find(id).is_some_and(|item| {
            index.has_children(item)
                && self.open_store.is_open(item, id, state.open_flags())
        })
    }

    /// Set the open flag of `id`; never closes.
    pub fn force_open(&self, id: &ItemId) -> MutationOutcome {
        let mut items = self.collection.write();
        let mut state = self.state.lock();
        match self.open_in(&mut items, &mut state, id) {
            None => MutationOutcome::NotFound,
            Some(true) => MutationOutcome::Applied,
            Some(false) => MutationOutcome::Unchanged,
        }
    }

    /// Returns whether the flag changed, or `None` when `id` is unknown.
    fn open_in(
        &self,
        items: &mut [T],
        state: &mut EngineState,
        id: &ItemId,
    ) -> Option<bool> {
        let position = self.index(items).position(id)?;
        if self
            .open_store
            .is_open(&items[position], id, state.open_flags())
        {
            return Some(false);
        }
        self.open_store.set_open(
            &mut items[position],
            id,
            true,
            state.open_flags_mut(),
        );
        state.mark_dirty();
        Some(true)
    }

    // --- Drag and drop ---

    /// Start dragging the item tagged with `element_id`.
    pub fn drag_start(
        &self,
        element_id: &str,
    ) -> Result<ItemId, DropRejection> {
        let source = {
            let items = self.collection.read();
            let index = self.index(&items);
            let source = resolve_element_id(&index, element_id)
                .ok_or(DropRejection::MissingSource)?;
            if index.find(&source).is_none() {
                return Err(DropRejection::UnknownSource { id: source });
            }
            source
        };
        self.state.lock().start_drag(source.clone());
        self.log.debug(format_args!("drag started for {source}"));
        Ok(source)
    }

    /// Classify the pointer over `site` and report whether dropping there
    /// would be accepted.
    ///
    /// Beyond structural checks, the `on_before_update` hook is consulted
    /// with the prospective parent; it may be called on every hover.
    pub async fn drag_over(
        &self,
        site: DropSite,
    ) -> Result<DropHover, DropRejection> {
        let Some(source) = self.state.lock().drag().source().cloned() else {
            return Err(DropRejection::NoActiveDrag);
        };

        let probe = {
            let items = self.collection.read();
            let index = self.index(&items);
            let target = match resolve_site(&index, &site) {
                Ok(target) => target,
                Err(rejection) => {
                    self.state.lock().clear_hover();
                    return Err(rejection);
                },
            };
            match plan_drop(&index, &source, &target, self.limits()) {
                Ok(plan) => match self.move_context(&index, &plan) {
                    Some(ctx) => Ok((plan.target, ctx)),
                    None => Err(DropHover {
                        target,
                        rejection: Some(DropRejection::UnknownSource {
                            id: source.clone(),
                        }),
                    }),
                },
                Err(rejection) => Err(DropHover {
                    target,
                    rejection: Some(rejection),
                }),
            }
        };

        let hover = match probe {
            Err(hover) => hover,
            Ok((target, ctx)) => {
                let allowed = self.hooks.update_pipeline().gate(&ctx).await;
                DropHover {
                    target,
                    rejection: (!allowed).then_some(DropRejection::Vetoed),
                }
            },
        };
        self.state.lock().set_hover(&source, hover.clone());
        Ok(hover)
    }

    fn move_context(
        &self,
        index: &TreeIndex<'_, T>,
        plan: &DropPlan,
    ) -> Option<HookContext<T>> {
        let item = index.find(&plan.source)?.clone();
        let parent = plan
            .new_parent
            .as_ref()
            .and_then(|parent| index.find(parent))
            .cloned();
        Some(HookContext::update(item, UpdateAction::Move, parent))
    }

    /// Clear the hover affordance; the drag source stays recorded.
    pub fn drag_leave(&self) {
        self.state.lock().clear_hover();
    }

    /// Abandon the gesture without moving anything.
    pub fn drag_end(&self) {
        if self.state.lock().end_drag().is_dragging() {
            self.log.debug(format_args!("drag cancelled"));
        }
    }

    /// Finish the gesture over `site`.
    ///
    /// The drop is validated again against the current collection, then
    /// applied through the update hooks. A drop as a child opens the new
    /// parent. The gesture ends whatever the result.
    pub async fn drop_on(
        &self,
        site: DropSite,
    ) -> Result<MutationOutcome, DropRejection> {
        let session = self.state.lock().end_drag();
        let Some(source) = session.source().cloned() else {
            return Err(DropRejection::NoActiveDrag);
        };

        let plan = {
            let items = self.collection.read();
            let index = self.index(&items);
            resolve_site(&index, &site).and_then(|target| {
                plan_drop(&index, &source, &target, self.limits())
            })
        };
        let plan = match plan {
            Ok(plan) => plan,
            Err(rejection) => {
                self.log.warn(format_args!(
                    "drop of {source} rejected: {rejection}"
                ));
                return Err(rejection);
            },
        };

        let outcome = self.move_to(&plan.source, &plan.target).await;
        if outcome.is_applied() {
            if let DropTarget::Item {
                id,
                location: DropLocation::AsChild,
            } = &plan.target
            {
                self.force_open(id);
            }
        }
        self.log
            .debug(format_args!("drop of {source} finished: {outcome:?}"));
        Ok(outcome)
    }

    /// Drive the drag state machine with a pointer event.
    pub async fn drag(&self, event: DragEvent) -> DragResponse {
        match event {
            DragEvent::Start { element_id } => {
                match self.drag_start(&element_id) {
                    Ok(source) => DragResponse::Started(source),
                    Err(rejection) => DragResponse::Rejected(rejection),
                }
            },
            DragEvent::Over { site } => match self.drag_over(site).await {
                Ok(hover) => DragResponse::Hover(hover),
                Err(rejection) => DragResponse::Rejected(rejection),
            },
            DragEvent::Leave => {
                self.drag_leave();
                DragResponse::Left
            },
            DragEvent::Drop { site } => match self.drop_on(site).await {
                Ok(outcome) => DragResponse::Dropped(outcome),
                Err(rejection) => DragResponse::Rejected(rejection),
            },
            DragEvent::Cancel => {
                self.drag_end();
                DragResponse::Cancelled
            },
        }
    }

    // --- Intents ---

    pub async fn dispatch(&self, intent: TreeIntent<T>) -> MutationOutcome {
        match intent {
            TreeIntent::Create { parent_id } => self.create(parent_id).await,
            TreeIntent::AddChild { id } => self.add_child(&id).await,
            TreeIntent::Delete { id } => self.delete(&id).await,
            TreeIntent::Update { item } => self.update(item).await,
            TreeIntent::Move {
                source,
                target,
                location,
            } => self.move_item(&source, target.as_ref(), location).await,
            TreeIntent::Toggle { id } => self.toggle(&id),
            TreeIntent::Select { id, selected } => {
                self.select(&id, selected).await
            },
            TreeIntent::Click { id } => self.click(&id).await,
        }
    }
}

fn display(id: Option<&ItemId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => String::from("root"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use log::Level;
    use serde_json::{Value, json};

    use super::*;
    use crate::dnd::DropGeometry;
    use crate::expand::OpenRequest;
    use crate::fields::Record;
    use crate::logging::testing::CapturingLog;
    use crate::options::Editable;

    fn records(values: Value) -> Vec<Record> {
        serde_json::from_value(values).expect("test records")
    }

    fn engine(
        values: Value,
        options: TreeOptions<Record>,
    ) -> TreeEngine<Record> {
        TreeEngine::new(TreeCollection::new(records(values)), options)
            .expect("engine")
    }

    fn sample() -> Value {
        json!([
            {"id": 1, "name": "a"},
            {"id": 2, "parentId": 1, "name": "b"},
            {"id": 3, "parentId": 2, "name": "c"},
            {"id": 4, "name": "d"},
            {"id": 5, "parentId": 4, "name": "e"},
        ])
    }

    fn order(engine: &TreeEngine<Record>) -> Vec<ItemId> {
        engine
            .collection()
            .snapshot()
            .iter()
            .filter_map(|item| engine.fields().id(item))
            .collect()
    }

    fn ids(values: &[i64]) -> Vec<ItemId> {
        values.iter().copied().map(ItemId::Num).collect()
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn at(percent: f32) -> DropGeometry {
        DropGeometry::new(0.0, 100.0, percent)
    }

    fn assert_send<F: Send>(_: &F) {}

    #[test]
    fn given_invalid_config_when_building_engine_then_error_is_returned() {
        let config = TreeConfig {
            max_depth: Some(0),
            ..TreeConfig::default()
        };
        let result = TreeEngine::new(
            TreeCollection::new(Vec::new()),
            TreeOptions::from_config(config),
        );
        assert!(matches!(result, Err(ConfigError::ZeroMaxDepth)));
    }

    #[test]
    fn given_engine_futures_when_checked_then_they_are_send() {
        let engine = engine(sample(), TreeOptions::default());
        let id = ItemId::Num(1);

        assert_send(&engine.create(None));
        assert_send(&engine.delete(&id));
        assert_send(&engine.move_item(&id, None, DropLocation::Above));
        assert_send(&engine.drag(DragEvent::Leave));
        assert_send(&engine.dispatch(TreeIntent::Toggle { id: id.clone() }));
    }

    #[tokio::test]
    async fn given_empty_tree_when_creating_then_fresh_root_is_selected() {
        let engine = engine(json!([]), TreeOptions::default());

        let outcome = engine.create(None).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        let items = engine.collection().snapshot();
        assert_eq!(items.len(), 1);
        let id = engine.fields().id(&items[0]).expect("fresh id");
        assert!(matches!(&id, ItemId::Text(text) if text.len() == 36));
        assert!(engine.fields().is_root(&items[0]));
        assert_eq!(engine.fields().name(&items[0]), DEFAULT_ITEM_NAME);
        assert_eq!(engine.selected_id(), Some(id));
        assert!(engine.take_dirty());
    }

    #[tokio::test]
    async fn given_parent_when_creating_then_factory_gets_depth_and_parent_opens()
    {
        let depths = Arc::new(Mutex::new(Vec::new()));
        let options = TreeOptions::default().with_factory({
            let depths = Arc::clone(&depths);
            move |parent: Option<Record>, depth| {
                depths.lock().push(depth);
                let parent_id = parent.and_then(|item| item.get("id").cloned());
                async move {
                    let mut item = Record::new();
                    item.insert(String::from("id"), json!(10));
                    if let Some(parent_id) = parent_id {
                        item.insert(String::from("parentId"), parent_id);
                    }
                    item
                }
            }
        });
        let engine = engine(sample(), options);

        let outcome = engine.create(Some(ItemId::Num(2))).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(*depths.lock(), vec![Some(2)]);
        assert_eq!(engine.depth(&ItemId::Num(10)), Some(2));
        assert!(engine.is_expanded(&ItemId::Num(2)));
        assert_eq!(engine.selected_id(), Some(ItemId::Num(10)));
    }

    #[tokio::test]
    async fn given_missing_parent_when_creating_then_nothing_is_built() {
        let built = counter();
        let options = TreeOptions::default().with_factory({
            let built = Arc::clone(&built);
            move |_, _| {
                built.fetch_add(1, Ordering::SeqCst);
                async { Record::new() }
            }
        });
        let engine = engine(sample(), options);

        let outcome = engine.create(Some(ItemId::Num(42))).await;

        assert_eq!(outcome, MutationOutcome::NotFound);
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(engine.collection().len(), 5);
    }

    #[tokio::test]
    async fn given_before_create_veto_when_creating_then_no_after_hooks_run() {
        let notified = counter();
        let count = |notified: &Arc<AtomicUsize>| {
            let notified = Arc::clone(notified);
            move || {
                notified.fetch_add(1, Ordering::SeqCst);
            }
        };
        let on_create = count(&notified);
        let on_select = count(&notified);
        let hooks = Hooks::new()
            .on_before_create(|_| async { false })
            .on_create(move |_| {
                on_create();
                async {}
            })
            .on_select(move |_, _| {
                on_select();
                async {}
            });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));

        let outcome = engine.create(None).await;

        assert_eq!(outcome, MutationOutcome::Vetoed);
        assert_eq!(engine.collection().len(), 5);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(engine.selected_id(), None);
        assert!(!engine.is_dirty());
    }

    #[tokio::test]
    async fn given_selected_subtree_when_deleting_then_it_is_gone_and_unselected()
    {
        let engine = engine(sample(), TreeOptions::default());
        engine.select(&ItemId::Num(3), true).await;

        let outcome = engine.delete(&ItemId::Num(1)).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(order(&engine), ids(&[4, 5]));
        assert_eq!(engine.selected_id(), None);
        assert_eq!(
            engine.delete(&ItemId::Num(1)).await,
            MutationOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn given_item_removed_while_hook_pending_when_deleting_then_not_found()
    {
        let collection = TreeCollection::new(records(sample()));
        let deleted = counter();
        let hooks = Hooks::new()
            .on_before_delete({
                let collection = collection.clone();
                move |_| {
                    collection.write().retain(|item| {
                        item.get("id") != Some(&json!(4))
                            && item.get("id") != Some(&json!(5))
                    });
                    async { true }
                }
            })
            .on_delete({
                let deleted = Arc::clone(&deleted);
                move |_| {
                    deleted.fetch_add(1, Ordering::SeqCst);
                    async {}
                }
            });
        let engine = TreeEngine::new(
            collection,
            TreeOptions::default().with_hooks(hooks),
        )
        .expect("engine");

        let outcome = engine.delete(&ItemId::Num(4)).await;

        assert_eq!(outcome, MutationOutcome::NotFound);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);
        assert_eq!(order(&engine), ids(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn given_edited_item_when_updating_then_position_is_kept() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_update({
            let seen = Arc::clone(&seen);
            move |ctx: HookContext<Record>| {
                seen.lock().push(ctx.action);
                async {}
            }
        });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));
        let mut item = engine.find(&ItemId::Num(2)).expect("item 2");
        item.insert(String::from("name"), json!("renamed"));

        let outcome = engine.update(item).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(order(&engine), ids(&[1, 2, 3, 4, 5]));
        let stored = engine.find(&ItemId::Num(2)).expect("item 2");
        assert_eq!(engine.fields().name(&stored), "renamed");
        assert_eq!(*seen.lock(), vec![Some(UpdateAction::Edit)]);

        let ghost = records(json!([{"id": 99}])).remove(0);
        assert_eq!(engine.update(ghost).await, MutationOutcome::NotFound);
    }

    #[tokio::test]
    async fn given_move_as_child_when_applied_then_hook_sees_new_parent() {
        let parents = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_before_update({
            let parents = Arc::clone(&parents);
            move |ctx: HookContext<Record>| {
                let parent = ctx.new_parent.and_then(|p| p.get("id").cloned());
                parents.lock().push((ctx.action, parent));
                async { true }
            }
        });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));

        let outcome = engine
            .move_item(
                &ItemId::Num(3),
                Some(&ItemId::Num(4)),
                DropLocation::AsChild,
            )
            .await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(order(&engine), ids(&[1, 2, 4, 5, 3]));
        assert_eq!(
            *parents.lock(),
            vec![(Some(UpdateAction::Move), Some(json!(4)))]
        );
        assert_eq!(engine.depth(&ItemId::Num(3)), Some(1));
    }

    #[tokio::test]
    async fn given_self_or_descendant_target_when_moving_then_nothing_changes() {
        let engine = engine(sample(), TreeOptions::default());

        let onto_self = engine
            .move_item(
                &ItemId::Num(2),
                Some(&ItemId::Num(2)),
                DropLocation::Above,
            )
            .await;
        let into_subtree = engine
            .move_item(
                &ItemId::Num(1),
                Some(&ItemId::Num(3)),
                DropLocation::AsChild,
            )
            .await;

        assert_eq!(onto_self, MutationOutcome::Unchanged);
        assert_eq!(into_subtree, MutationOutcome::Unchanged);
        assert_eq!(order(&engine), ids(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn given_item_with_children_when_toggling_twice_then_state_is_restored() {
        let engine = engine(sample(), TreeOptions::default());
        let id = ItemId::Num(1);
        let before = engine.is_expanded(&id);

        assert_eq!(engine.toggle(&id), MutationOutcome::Applied);
        assert_ne!(engine.is_expanded(&id), before);
        assert_eq!(engine.toggle(&id), MutationOutcome::Applied);
        assert_eq!(engine.is_expanded(&id), before);
    }

    #[test]
    fn given_leaf_when_toggling_then_nothing_changes() {
        let engine = engine(sample(), TreeOptions::default());

        assert_eq!(engine.toggle(&ItemId::Num(3)), MutationOutcome::Unchanged);
        assert_eq!(engine.toggle(&ItemId::Num(9)), MutationOutcome::NotFound);
        assert!(!engine.is_dirty());
    }

    #[test]
    fn given_open_flag_on_leaf_when_checking_expansion_then_it_is_collapsed() {
        let engine = engine(
            json!([{"id": 1, "isOpen": true}]),
            TreeOptions::default(),
        );
        assert!(!engine.is_expanded(&ItemId::Num(1)));
    }

    #[test]
    fn given_open_item_when_forcing_open_then_it_stays_open() {
        let engine = engine(sample(), TreeOptions::default());
        let id = ItemId::Num(4);

        assert_eq!(engine.force_open(&id), MutationOutcome::Applied);
        assert_eq!(engine.force_open(&id), MutationOutcome::Unchanged);
        assert!(engine.is_expanded(&id));
        let stored = engine.find(&id).expect("item 4");
        assert_eq!(stored.get("isOpen"), Some(&json!(true)));
    }

    #[test]
    fn given_external_store_when_toggling_then_records_stay_untouched() {
        let open = Arc::new(Mutex::new(std::collections::HashSet::new()));
        let store = OpenStore::external({
            let open = Arc::clone(&open);
            move |id: &ItemId, request| match request {
                OpenRequest::Get => open.lock().contains(id),
                OpenRequest::Set(true) => open.lock().insert(id.clone()),
                OpenRequest::Set(false) => !open.lock().remove(id),
            }
        });
        let engine =
            engine(sample(), TreeOptions::default().with_open_store(store));

        engine.toggle(&ItemId::Num(1));

        assert!(open.lock().contains(&ItemId::Num(1)));
        assert!(engine.is_expanded(&ItemId::Num(1)));
        let stored = engine.find(&ItemId::Num(1)).expect("item 1");
        assert!(!stored.contains_key("isOpen"));
    }

    #[tokio::test]
    async fn given_click_when_repeated_then_selection_toggles() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_select({
            let events = Arc::clone(&events);
            move |item: Record, selected| {
                events.lock().push((item.get("id").cloned(), selected));
                async {}
            }
        });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));
        let id = ItemId::Num(2);

        engine.click(&id).await;
        assert_eq!(engine.selected_id(), Some(id.clone()));
        engine.click(&id).await;
        assert_eq!(engine.selected_id(), None);

        assert_eq!(
            *events.lock(),
            vec![(Some(json!(2)), true), (Some(json!(2)), false)]
        );
    }

    #[tokio::test]
    async fn given_drag_gesture_when_leaving_then_source_survives_for_drop() {
        let engine = engine(sample(), TreeOptions::default());

        assert_eq!(
            engine.drag_start("tree-item-5"),
            Ok(ItemId::Num(5))
        );
        let hover = engine
            .drag_over(DropSite::item("tree-item-2", at(50.0)))
            .await
            .expect("hover");
        assert!(hover.is_valid());
        assert_eq!(hover.target.location(), Some(DropLocation::AsChild));

        engine.drag_leave();
        assert_eq!(engine.drag_session().hover(), None);
        assert_eq!(engine.drag_session().source(), Some(&ItemId::Num(5)));

        let outcome = engine
            .drop_on(DropSite::item("tree-item-2", at(50.0)))
            .await;

        assert_eq!(outcome, Ok(MutationOutcome::Applied));
        assert_eq!(engine.drag_session(), DragSession::Idle);
        let moved = engine.find(&ItemId::Num(5)).expect("item 5");
        assert_eq!(engine.fields().parent_id(&moved), Some(ItemId::Num(2)));
        assert!(engine.is_expanded(&ItemId::Num(2)));
    }

    #[tokio::test]
    async fn given_hover_veto_when_dragging_over_then_rejection_is_reported() {
        let asked = counter();
        let hooks = Hooks::new().on_before_update({
            let asked = Arc::clone(&asked);
            move |_| {
                asked.fetch_add(1, Ordering::SeqCst);
                async { false }
            }
        });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));
        engine.drag_start("tree-item-3").expect("drag");

        let hover = engine
            .drag_over(DropSite::item("tree-item-4", at(10.0)))
            .await
            .expect("hover");

        assert_eq!(hover.rejection, Some(DropRejection::Vetoed));
        assert_eq!(engine.drag_session().hover(), Some(&hover));
        assert_eq!(asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn given_container_site_when_dropping_then_item_becomes_last_root() {
        let engine = engine(sample(), TreeOptions::default());
        engine.drag_start("tree-item-3").expect("drag");

        let outcome = engine.drop_on(DropSite::Container).await;

        assert_eq!(outcome, Ok(MutationOutcome::Applied));
        assert_eq!(order(&engine), ids(&[1, 2, 4, 5, 3]));
        assert_eq!(engine.depth(&ItemId::Num(3)), Some(0));
    }

    #[tokio::test]
    async fn given_unidentified_site_when_dropping_then_drop_is_rejected_and_logged()
    {
        let sink = Arc::new(CapturingLog::default());
        let engine = engine(
            sample(),
            TreeOptions::default().with_logger(sink.clone()),
        );
        engine.drag_start("tree-item-3").expect("drag");

        let outcome = engine.drop_on(DropSite::Unknown).await;

        assert_eq!(outcome, Err(DropRejection::MissingTarget));
        assert_eq!(engine.drag_session(), DragSession::Idle);
        assert_eq!(order(&engine), ids(&[1, 2, 3, 4, 5]));
        assert!(
            sink.records()
                .iter()
                .any(|(level, message)| *level == Level::Warn
                    && message.contains("rejected"))
        );
    }

    #[tokio::test]
    async fn given_no_drag_when_hovering_or_dropping_then_no_active_drag() {
        let engine = engine(sample(), TreeOptions::default());

        assert_eq!(
            engine.drag(DragEvent::Over { site: DropSite::Container }).await,
            DragResponse::Rejected(DropRejection::NoActiveDrag)
        );
        assert_eq!(
            engine.drag(DragEvent::Drop { site: DropSite::Container }).await,
            DragResponse::Rejected(DropRejection::NoActiveDrag)
        );
        assert_eq!(
            engine
                .drag(DragEvent::Start {
                    element_id: String::from("tree-item-77")
                })
                .await,
            DragResponse::Rejected(DropRejection::UnknownSource {
                id: ItemId::Num(77)
            })
        );
    }

    #[tokio::test]
    async fn given_cancelled_gesture_when_dropping_then_nothing_moves() {
        let engine = engine(sample(), TreeOptions::default());

        engine
            .drag(DragEvent::Start {
                element_id: String::from("tree-item-3"),
            })
            .await;
        assert_eq!(
            engine.drag(DragEvent::Cancel).await,
            DragResponse::Cancelled
        );
        let response = engine
            .drag(DragEvent::Drop {
                site: DropSite::Container,
            })
            .await;

        assert_eq!(
            response,
            DragResponse::Rejected(DropRejection::NoActiveDrag)
        );
        assert_eq!(order(&engine), ids(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn given_editable_flags_when_querying_capabilities_then_gates_follow() {
        let config = TreeConfig {
            max_depth: Some(1),
            multiple_roots: false,
            editable: Editable {
                can_create: true,
                can_delete: true,
                can_update: false,
                can_delete_parent: false,
            },
            ..TreeConfig::default()
        };
        let engine = engine(sample(), TreeOptions::from_config(config));

        assert!(engine.can_create_child(&ItemId::Num(1)));
        assert!(!engine.can_create_child(&ItemId::Num(2)));
        assert!(!engine.can_create_child(&ItemId::Num(42)));
        assert!(!engine.can_create_root());
        assert!(!engine.can_delete(&ItemId::Num(1)));
        assert!(engine.can_delete(&ItemId::Num(3)));
        assert!(!engine.can_drag());
    }

    #[test]
    fn given_expanded_items_when_listing_rows_then_only_visible_rows_appear() {
        let engine = engine(sample(), TreeOptions::default());
        engine.toggle(&ItemId::Num(1));

        let rows: Vec<(ItemId, usize)> = engine
            .visible_rows()
            .into_iter()
            .map(|row| (row.id, row.depth))
            .collect();

        assert_eq!(
            rows,
            vec![
                (ItemId::Num(1), 0),
                (ItemId::Num(2), 1),
                (ItemId::Num(4), 0),
            ]
        );
    }

    #[tokio::test]
    async fn given_intents_when_dispatching_then_engine_operations_run() {
        let engine = engine(sample(), TreeOptions::default());

        let outcomes = [
            engine
                .dispatch(TreeIntent::AddChild { id: ItemId::Num(5) })
                .await,
            engine
                .dispatch(TreeIntent::Move {
                    source: ItemId::Num(4),
                    target: Some(ItemId::Num(1)),
                    location: DropLocation::Above,
                })
                .await,
            engine
                .dispatch(TreeIntent::Delete { id: ItemId::Num(1) })
                .await,
        ];

        assert!(outcomes.iter().all(|outcome| outcome.is_applied()));
        let remaining = order(&engine);
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining[..2], ids(&[4, 5]));
        assert!(engine.is_expanded(&ItemId::Num(5)));
    }

    #[test]
    fn given_reset_when_state_exists_then_selection_and_drag_clear() {
        let engine = engine(sample(), TreeOptions::default());
        engine.drag_start("tree-item-2").expect("drag");

        engine.reset_state();

        assert_eq!(engine.drag_session(), DragSession::Idle);
        assert_eq!(engine.selected_id(), None);
        assert!(engine.take_dirty());
    }

    #[test]
    fn given_cyclic_collection_when_building_then_warning_is_logged() {
        let sink = Arc::new(CapturingLog::default());
        let engine = engine(
            json!([{"id": 1, "parentId": 2}, {"id": 2, "parentId": 1}]),
            TreeOptions::default().with_logger(sink.clone()),
        );

        assert_eq!(engine.depth(&ItemId::Num(1)), Some(2));
        assert!(matches!(
            sink.records().first(),
            Some((Level::Warn, message)) if message.contains("inconsistent")
        ));
    }

    #[tokio::test]
    async fn given_create_with_hooks_when_applied_then_select_precedes_create()
    {
        let events = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new()
            .on_create({
                let events = Arc::clone(&events);
                move |_| {
                    events.lock().push("create");
                    async {}
                }
            })
            .on_select({
                let events = Arc::clone(&events);
                move |_, _| {
                    events.lock().push("select");
                    async {}
                }
            });
        let engine = engine(sample(), TreeOptions::default().with_hooks(hooks));

        let outcome = engine.create(Some(ItemId::Num(4))).await;

        assert_eq!(outcome, MutationOutcome::Applied);
        assert_eq!(*events.lock(), vec!["select", "create"]);
    }

    #[test]
    fn given_deep_chain_when_building_engine_then_depths_resolve_quickly() {
        let chain: Vec<Value> = (1..=5_000_i64)
            .map(|id| match id {
                1 => json!({"id": id}),
                _ => json!({"id": id, "parentId": id - 1}),
            })
            .collect();
        let started = std::time::Instant::now();

        let engine = engine(Value::Array(chain), TreeOptions::default());

        assert_eq!(engine.depth(&ItemId::Num(5_000)), Some(4_999));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn given_ephemeral_open_store_when_editing_then_items_stay_untouched()
    {
        let options = TreeOptions::from_json(r#"{"isOpen": null}"#)
            .expect("options");
        let engine = engine(sample(), options);
        let one = ItemId::Num(1);
        let three = ItemId::Num(3);

        assert_eq!(engine.toggle(&one), MutationOutcome::Applied);
        assert!(engine.is_expanded(&one));

        let created = engine.create(Some(ItemId::Num(2))).await;
        assert_eq!(created, MutationOutcome::Applied);
        assert!(engine.is_expanded(&ItemId::Num(2)));

        engine.drag_start("tree-item-5").expect("drag start");
        let dropped =
            engine.drop_on(DropSite::item("tree-item-3", at(50.0))).await;
        assert_eq!(dropped, Ok(MutationOutcome::Applied));
        assert!(engine.is_expanded(&three));

        assert_eq!(engine.delete(&three).await, MutationOutcome::Applied);
        assert!(!engine.state.lock().open_flags().contains_key(&three));
        assert!(
            engine
                .collection()
                .snapshot()
                .iter()
                .all(|item| !item.contains_key("isOpen"))
        );
    }
}
