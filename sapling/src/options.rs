//! Tree configuration: the serialisable part loaded from JSON and the
//! runtime options carrying accessors, hooks and the logger.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use log::Log;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::expand::OpenStore;
use crate::fields::{FieldAccessor, FieldNames, Record};
use crate::hooks::{CreateFactory, Hooks, create_factory};

/// Which editing affordances a host should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Editable {
    pub can_create: bool,
    pub can_delete: bool,
    pub can_update: bool,
    /// Allow deleting items that still have children.
    pub can_delete_parent: bool,
}

impl Editable {
    pub fn all() -> Self {
        Self {
            can_create: true,
            can_delete: true,
            can_update: true,
            can_delete_parent: true,
        }
    }
}

/// Serialisable tree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    #[serde(flatten)]
    pub fields: FieldNames,
    /// Deepest allowed depth; roots sit at depth `0`. `None` is unbounded.
    pub max_depth: Option<usize>,
    pub multiple_roots: bool,
    pub editable: Editable,
    /// Emit debug records for engine operations.
    pub logging: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            max_depth: None,
            multiple_roots: true,
            editable: Editable::default(),
            logging: false,
        }
    }
}

impl TreeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fields.validate()?;
        if self.max_depth == Some(0) {
            return Err(ConfigError::ZeroMaxDepth);
        }
        Ok(())
    }
}

/// Everything an engine needs besides the collection.
pub struct TreeOptions<T> {
    pub(crate) config: TreeConfig,
    pub(crate) fields: FieldAccessor<T>,
    pub(crate) open_store: OpenStore<T>,
    pub(crate) hooks: Hooks<T>,
    pub(crate) factory: Option<CreateFactory<T>>,
    pub(crate) logger: Option<Arc<dyn Log>>,
}

impl<T> Clone for TreeOptions<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            fields: self.fields.clone(),
            open_store: self.open_store.clone(),
            hooks: self.hooks.clone(),
            factory: self.factory.clone(),
            logger: self.logger.clone(),
        }
    }
}

impl<T> fmt::Debug for TreeOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOptions")
            .field("config", &self.config)
            .field("open_store", &self.open_store)
            .field("hooks", &self.hooks)
            .field("factory", &self.factory.is_some())
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> TreeOptions<T> {
    /// Options for a custom item type. Expansion state starts ephemeral.
    pub fn new(config: TreeConfig, fields: FieldAccessor<T>) -> Self {
        Self {
            config,
            fields,
            open_store: OpenStore::Ephemeral,
            hooks: Hooks::default(),
            factory: None,
            logger: None,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn with_hooks(mut self, hooks: Hooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_open_store(mut self, store: OpenStore<T>) -> Self {
        self.open_store = store;
        self
    }

    /// Route engine records to `logger` instead of the global `log` facade.
    pub fn with_logger(mut self, logger: Arc<dyn Log>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }
}

impl<T: Send + 'static> TreeOptions<T> {
    /// Replace the default item factory.
    ///
    /// The factory receives the parent (if any) and the depth the new item
    /// will sit at (`None` at the root).
    pub fn with_factory<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(Option<T>, Option<usize>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.factory = Some(create_factory(factory));
        self
    }
}

impl TreeOptions<Record> {
    /// Options over [`Record`] items using the configured field names.
    pub fn from_config(config: TreeConfig) -> Self {
        let fields = FieldAccessor::from_names(&config.fields);
        let open_store = OpenStore::from_names(&config.fields);
        Self {
            open_store,
            ..Self::new(config, fields)
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        TreeConfig::from_json(json).map(Self::from_config)
    }
}

impl Default for TreeOptions<Record> {
    fn default() -> Self {
        Self::from_config(TreeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_empty_json_when_loading_then_defaults_apply() {
        let config = TreeConfig::from_json("{}").expect("config");

        assert_eq!(config, TreeConfig::default());
        assert!(config.multiple_roots);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.fields.is_open.as_deref(), Some("isOpen"));
    }

    #[test]
    fn given_camel_case_json_when_loading_then_options_are_mapped() {
        let config = TreeConfig::from_json(
            r#"{
                "id": "key",
                "parentId": "owner",
                "isOpen": null,
                "maxDepth": 3,
                "multipleRoots": false,
                "editable": {"canCreate": true, "canDeleteParent": true},
                "logging": true
            }"#,
        )
        .expect("config");

        assert_eq!(config.fields.id, "key");
        assert_eq!(config.fields.parent_id, "owner");
        assert_eq!(config.fields.name, "name");
        assert_eq!(config.fields.is_open, None);
        assert_eq!(config.max_depth, Some(3));
        assert!(!config.multiple_roots);
        assert!(config.editable.can_create);
        assert!(!config.editable.can_delete);
        assert!(config.editable.can_delete_parent);
        assert!(config.logging);
    }

    #[test]
    fn given_zero_max_depth_when_loading_then_error_is_returned() {
        assert!(matches!(
            TreeConfig::from_json(r#"{"maxDepth": 0}"#),
            Err(ConfigError::ZeroMaxDepth)
        ));
    }

    #[test]
    fn given_malformed_json_when_loading_then_json_error_is_returned() {
        assert!(matches!(
            TreeConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn given_config_without_open_field_when_building_then_store_is_ephemeral()
    {
        let options = TreeOptions::from_json(r#"{"isOpen": null}"#)
            .expect("options");
        assert!(matches!(options.open_store, OpenStore::Ephemeral));

        let options = TreeOptions::<Record>::default();
        assert!(matches!(options.open_store, OpenStore::Field { .. }));
    }
}
