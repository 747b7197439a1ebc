//! Hierarchical tree mutation and reordering engine.
//!
//! The crate keeps a flat, ordered collection of items linked by parent ids
//! and offers the operations a tree editor needs, independent of how the
//! tree is rendered:
//! - create, delete (cascading), update and move, each gated by optional
//!   asynchronous `before` hooks that can veto the change;
//! - drag-and-drop: classification of the pointer into above/below/as-child
//!   zones, drop validation and repositioning;
//! - expand/collapse state stored on the item, in a host store, or inside
//!   the engine.
//!
//! Items are read through a [`FieldAccessor`], so any item type works. The
//! open-ended [`Record`] type (a JSON object) is supported out of the box
//! with field names taken from a [`TreeConfig`].
//!
//! # Quick Example
//!
//! ```no_run
//! use sapling::{
//!     DropGeometry, DropSite, ItemId, TreeCollection, TreeEngine,
//!     TreeOptions,
//! };
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), sapling::ConfigError> {
//! let items = serde_json::from_value(json!([
//!     {"id": 1, "name": "Docs"},
//!     {"id": 2, "name": "Notes"},
//! ]))?;
//! let collection = TreeCollection::new(items);
//! let options = TreeOptions::from_json(r#"{"maxDepth": 4}"#)?;
//! let engine = TreeEngine::new(collection.clone(), options)?;
//!
//! engine.create(Some(ItemId::Num(1))).await;
//! engine.drag_start("tree-item-2").ok();
//! let geometry = DropGeometry::new(0.0, 24.0, 12.0);
//! engine.drop_on(DropSite::item("tree-item-1", geometry)).await.ok();
//!
//! for row in engine.visible_rows() {
//!     println!("{}{}", "  ".repeat(row.depth), row.id);
//! }
//! # Ok(())
//! # }
//! ```

mod collection;
mod dnd;
mod engine;
mod errors;
mod event;
mod expand;
mod fields;
mod hooks;
mod id;
mod index;
mod logging;
mod mutation;
mod options;
mod state;
mod view;

pub use collection::TreeCollection;
pub use dnd::{
    DragSession, DropGeometry, DropHover, DropLocation, DropSite, DropTarget,
};
pub use engine::TreeEngine;
pub use errors::{ConfigError, DropRejection, IntegrityError};
pub use event::{DragEvent, DragResponse, MutationOutcome, TreeIntent};
pub use expand::{ExternalOpenStore, OpenRequest, OpenStore};
pub use fields::{
    Composer, DEFAULT_ITEM_NAME, FieldAccessor, FieldAccessorBuilder,
    FieldNames, Getter, Record, Setter,
};
pub use hooks::{
    AfterHook, BeforeHook, CreateFactory, HookContext, HookFuture, Hooks,
    SelectHook, UpdateAction, Verdict, create_factory,
};
pub use id::{ELEMENT_ID_PREFIX, ItemId};
pub use index::TreeIndex;
pub use logging::LOG_TARGET;
pub use options::{Editable, TreeConfig, TreeOptions};
pub use view::{
    TreeNode, VisibleRow, flatten_records, nest, nest_records,
};
