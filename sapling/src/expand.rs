//! Where the open/closed flag of an item lives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::fields::{FieldNames, Getter, Record, Setter};
use crate::id::ItemId;

/// Request sent to an external open-state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenRequest {
    Get,
    Set(bool),
}

/// Host-owned open-state store: answers the current flag for `Get`, stores
/// and echoes the flag for `Set`.
///
/// The store is called while the engine holds its locks and must not call
/// back into the engine.
pub type ExternalOpenStore =
    Arc<dyn Fn(&ItemId, OpenRequest) -> bool + Send + Sync>;

/// Open-state policy, chosen once per engine.
pub enum OpenStore<T> {
    /// Read and write a flag on the item itself.
    Field {
        get: Getter<T, bool>,
        set: Setter<T, bool>,
    },
    /// Delegate to a host-owned store keyed by item id.
    External(ExternalOpenStore),
    /// Keep flags inside the engine; they vanish with it.
    Ephemeral,
}

impl<T> Clone for OpenStore<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Field { get, set } => Self::Field {
                get: Arc::clone(get),
                set: Arc::clone(set),
            },
            Self::External(store) => Self::External(Arc::clone(store)),
            Self::Ephemeral => Self::Ephemeral,
        }
    }
}

impl<T> fmt::Debug for OpenStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Field { .. } => "Field",
            Self::External(_) => "External",
            Self::Ephemeral => "Ephemeral",
        };
        f.debug_tuple("OpenStore").field(&kind).finish()
    }
}

impl<T> Default for OpenStore<T> {
    fn default() -> Self {
        Self::Ephemeral
    }
}

impl<T> OpenStore<T> {
    pub fn field(
        get: impl Fn(&T) -> bool + Send + Sync + 'static,
        set: impl Fn(&mut T, bool) + Send + Sync + 'static,
    ) -> Self {
        Self::Field {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    pub fn external(
        store: impl Fn(&ItemId, OpenRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::External(Arc::new(store))
    }

    /// Current flag of an item. Absent values read as closed.
    pub(crate) fn is_open(
        &self,
        item: &T,
        id: &ItemId,
        ephemeral: &HashMap<ItemId, bool>,
    ) -> bool {
        match self {
            Self::Field { get, .. } => get(item),
            Self::External(store) => store(id, OpenRequest::Get),
            Self::Ephemeral => ephemeral.get(id).copied().unwrap_or(false),
        }
    }

    pub(crate) fn set_open(
        &self,
        item: &mut T,
        id: &ItemId,
        open: bool,
        ephemeral: &mut HashMap<ItemId, bool>,
    ) {
        match self {
            Self::Field { set, .. } => set(item, open),
            Self::External(store) => {
                store(id, OpenRequest::Set(open));
            },
            Self::Ephemeral => {
                ephemeral.insert(id.clone(), open);
            },
        }
    }
}

impl OpenStore<Record> {
    /// Persist the flag under `name` inside each record.
    pub fn record_field(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.clone();
        Self::field(
            move |item: &Record| {
                matches!(item.get(&key), Some(Value::Bool(true)))
            },
            move |item: &mut Record, open| {
                item.insert(name.clone(), Value::Bool(open));
            },
        )
    }

    /// Field store when `is_open` is named, ephemeral otherwise.
    pub fn from_names(names: &FieldNames) -> Self {
        match &names.is_open {
            Some(name) => Self::record_field(name.clone()),
            None => Self::Ephemeral,
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    #[test]
    fn given_record_field_when_toggling_then_flag_is_written_to_item() {
        let store = OpenStore::record_field("expanded");
        let mut item = Record::new();
        let id = ItemId::Num(1);
        let mut flags = HashMap::new();

        assert!(!store.is_open(&item, &id, &flags));
        store.set_open(&mut item, &id, true, &mut flags);

        assert_eq!(item.get("expanded"), Some(&json!(true)));
        assert!(store.is_open(&item, &id, &flags));
        assert!(flags.is_empty());
    }

    #[test]
    fn given_ephemeral_store_when_setting_then_item_is_untouched() {
        let store = OpenStore::<Record>::Ephemeral;
        let mut item = Record::new();
        let id = ItemId::from("a");
        let mut flags = HashMap::new();

        store.set_open(&mut item, &id, true, &mut flags);

        assert!(item.is_empty());
        assert!(store.is_open(&item, &id, &flags));
    }

    #[test]
    fn given_external_store_when_setting_then_requests_are_delegated() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let store = OpenStore::<Record>::external({
            let calls = Arc::clone(&calls);
            move |id, request| {
                calls.lock().push((id.clone(), request));
                matches!(request, OpenRequest::Set(true))
            }
        });
        let mut item = Record::new();
        let id = ItemId::Num(3);
        let mut flags = HashMap::new();

        store.set_open(&mut item, &id, true, &mut flags);
        assert!(!store.is_open(&item, &id, &flags));

        assert_eq!(
            *calls.lock(),
            vec![
                (ItemId::Num(3), OpenRequest::Set(true)),
                (ItemId::Num(3), OpenRequest::Get)
            ]
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn given_names_without_open_field_when_building_then_store_is_ephemeral()
    {
        let names = FieldNames {
            is_open: None,
            ..FieldNames::default()
        };
        assert!(matches!(
            OpenStore::from_names(&names),
            OpenStore::Ephemeral
        ));
    }
}
