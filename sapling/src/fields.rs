//! Field accessors: how the engine reads identity, parent and name out of an
//! item, independent of the item's concrete layout.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;
use crate::id::ItemId;

/// Open-ended tree item keyed by field name.
pub type Record = serde_json::Map<String, Value>;

/// Name given to items built by the default factory.
pub const DEFAULT_ITEM_NAME: &str = "New...";

pub type Getter<T, V> = Arc<dyn Fn(&T) -> V + Send + Sync>;
pub type Setter<T, V> = Arc<dyn Fn(&mut T, V) + Send + Sync>;
pub type Composer<T> =
    Arc<dyn Fn(ItemId, Option<ItemId>, &str) -> T + Send + Sync>;

/// Names of the logical fields inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldNames {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub children: String,
    /// Persisted open flag. `None` keeps expansion state in the engine.
    pub is_open: Option<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: String::from("id"),
            parent_id: String::from("parentId"),
            name: String::from("name"),
            children: String::from("children"),
            is_open: Some(String::from("isOpen")),
        }
    }
}

impl FieldNames {
    /// Reject empty names and names mapped to more than one field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut named: Vec<(&'static str, &str)> = vec![
            ("id", self.id.as_str()),
            ("parentId", self.parent_id.as_str()),
            ("name", self.name.as_str()),
            ("children", self.children.as_str()),
        ];
        if let Some(is_open) = &self.is_open {
            named.push(("isOpen", is_open.as_str()));
        }

        for (index, &(field, name)) in named.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyFieldName { field });
            }
            if named[..index].iter().any(|&(_, other)| other == name) {
                return Err(ConfigError::DuplicateFieldName {
                    name: name.to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Accessor functions over an item type, resolved once per engine.
pub struct FieldAccessor<T> {
    id: Getter<T, Option<ItemId>>,
    parent_id: Getter<T, Option<ItemId>>,
    set_parent_id: Setter<T, Option<ItemId>>,
    name: Getter<T, String>,
    compose: Composer<T>,
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            parent_id: Arc::clone(&self.parent_id),
            set_parent_id: Arc::clone(&self.set_parent_id),
            name: Arc::clone(&self.name),
            compose: Arc::clone(&self.compose),
        }
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor").finish_non_exhaustive()
    }
}

impl<T> FieldAccessor<T> {
    /// Start building accessors for a custom item type.
    pub fn builder() -> FieldAccessorBuilder<T> {
        FieldAccessorBuilder::default()
    }

    /// Identifier of the item; blank identifiers read as `None`.
    pub fn id(&self, item: &T) -> Option<ItemId> {
        (self.id)(item).and_then(ItemId::non_blank)
    }

    /// Parent identifier of the item; `None` marks a root.
    pub fn parent_id(&self, item: &T) -> Option<ItemId> {
        (self.parent_id)(item).and_then(ItemId::non_blank)
    }

    /// Point the item at a new parent, or make it a root.
    pub fn set_parent_id(&self, item: &mut T, parent: Option<ItemId>) {
        (self.set_parent_id)(item, parent)
    }

    /// Display name of the item.
    pub fn name(&self, item: &T) -> String {
        (self.name)(item)
    }

    /// Build a fresh item, used by the default create factory.
    pub fn compose(
        &self,
        id: ItemId,
        parent: Option<ItemId>,
        name: &str,
    ) -> T {
        (self.compose)(id, parent, name)
    }

    /// Return whether the item is a root.
    pub fn is_root(&self, item: &T) -> bool {
        self.parent_id(item).is_none()
    }
}

impl FieldAccessor<Record> {
    /// Accessors reading the fields named in `names` out of a [`Record`].
    pub fn from_names(names: &FieldNames) -> Self {
        let id_key = names.id.clone();
        let parent_key = names.parent_id.clone();
        let name_key = names.name.clone();

        let id = {
            let key = id_key.clone();
            Arc::new(move |item: &Record| {
                item.get(&key).and_then(ItemId::from_value)
            })
        };
        let parent_id = {
            let key = parent_key.clone();
            Arc::new(move |item: &Record| {
                item.get(&key).and_then(ItemId::from_value)
            })
        };
        let set_parent_id = {
            let key = parent_key.clone();
            Arc::new(move |item: &mut Record, parent: Option<ItemId>| {
                match parent {
                    Some(parent) => {
                        item.insert(key.clone(), parent.to_value());
                    },
                    None => {
                        item.remove(&key);
                    },
                }
            })
        };
        let name = {
            let key = name_key.clone();
            Arc::new(move |item: &Record| match item.get(&key) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
        };
        let compose = Arc::new(
            move |id: ItemId, parent: Option<ItemId>, name: &str| {
                let mut item = Record::new();
                item.insert(id_key.clone(), id.to_value());
                if let Some(parent) = parent {
                    item.insert(parent_key.clone(), parent.to_value());
                }
                item.insert(name_key.clone(), Value::String(name.to_owned()));
                item
            },
        );

        Self {
            id,
            parent_id,
            set_parent_id,
            name,
            compose,
        }
    }
}

/// Builder for [`FieldAccessor`] over custom item types.
pub struct FieldAccessorBuilder<T> {
    id: Option<Getter<T, Option<ItemId>>>,
    parent_id: Option<Getter<T, Option<ItemId>>>,
    set_parent_id: Option<Setter<T, Option<ItemId>>>,
    name: Option<Getter<T, String>>,
    compose: Option<Composer<T>>,
}

impl<T> Default for FieldAccessorBuilder<T> {
    fn default() -> Self {
        Self {
            id: None,
            parent_id: None,
            set_parent_id: None,
            name: None,
            compose: None,
        }
    }
}

impl<T> FieldAccessorBuilder<T> {
    pub fn id(
        mut self,
        getter: impl Fn(&T) -> Option<ItemId> + Send + Sync + 'static,
    ) -> Self {
        self.id = Some(Arc::new(getter));
        self
    }

    pub fn parent_id(
        mut self,
        getter: impl Fn(&T) -> Option<ItemId> + Send + Sync + 'static,
    ) -> Self {
        self.parent_id = Some(Arc::new(getter));
        self
    }

    pub fn set_parent_id(
        mut self,
        setter: impl Fn(&mut T, Option<ItemId>) + Send + Sync + 'static,
    ) -> Self {
        self.set_parent_id = Some(Arc::new(setter));
        self
    }

    pub fn name(
        mut self,
        getter: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        self.name = Some(Arc::new(getter));
        self
    }

    pub fn compose(
        mut self,
        compose: impl Fn(ItemId, Option<ItemId>, &str) -> T
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.compose = Some(Arc::new(compose));
        self
    }

    /// Finish the accessor set; every accessor is required.
    pub fn build(self) -> Result<FieldAccessor<T>, ConfigError> {
        Ok(FieldAccessor {
            id: self.id.ok_or(ConfigError::MissingAccessor("id"))?,
            parent_id: self
                .parent_id
                .ok_or(ConfigError::MissingAccessor("parentId"))?,
            set_parent_id: self
                .set_parent_id
                .ok_or(ConfigError::MissingAccessor("setParentId"))?,
            name: self.name.ok_or(ConfigError::MissingAccessor("name"))?,
            compose: self
                .compose
                .ok_or(ConfigError::MissingAccessor("compose"))?,
        })
    }
}
