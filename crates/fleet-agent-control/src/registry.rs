//! Registry of known modules.
//!
//! Maps a module name to its registered configuration. Uniqueness of names
//! is enforced by the orchestrator before an entry is inserted.

use std::collections::HashMap;

use fleet_agent_core::{ConfigItemUpdate, CoreError, ModuleConfig, ModuleId};
use parking_lot::RwLock;

/// Module configurations keyed by module name.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<ModuleId, ModuleConfig>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of a module's configuration.
    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<ModuleConfig> {
        self.modules.read().get(id).cloned()
    }

    /// Check if a module is registered.
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.read().contains_key(id)
    }

    /// Insert or replace a configuration, keyed by its name.
    pub fn insert(&self, config: ModuleConfig) -> Option<ModuleConfig> {
        self.modules.write().insert(config.name.clone(), config)
    }

    /// Remove a module.
    pub fn remove(&self, id: &ModuleId) -> Option<ModuleConfig> {
        self.modules.write().remove(id)
    }

    /// Merge the present fields of `update` into a module's config item and
    /// return the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ModuleNotFound` if the module is not registered.
    pub fn update_config_item(
        &self,
        id: &ModuleId,
        update: &ConfigItemUpdate,
    ) -> Result<ModuleConfig, CoreError> {
        let mut modules = self.modules.write();
        let config = modules
            .get_mut(id)
            .ok_or_else(|| CoreError::ModuleNotFound(id.clone()))?;
        config.config_item.apply(update);
        Ok(config.clone())
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Remove every module.
    pub fn clear(&self) {
        self.modules.write().clear();
    }

    /// Registered module names, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(name).unwrap()
    }

    #[test]
    fn registry_insert_and_get() {
        let registry = ModuleRegistry::new();
        assert!(registry.get(&id("a")).is_none());

        let mut config = ModuleConfig::new(id("a"));
        config.version = "1.0.0".to_string();
        assert!(registry.insert(config).is_none());

        assert!(registry.contains(&id("a")));
        assert_eq!(registry.get(&id("a")).unwrap().version, "1.0.0");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_replace_keeps_one_entry() {
        let registry = ModuleRegistry::new();
        registry.insert(ModuleConfig::new(id("a")));

        let mut config = ModuleConfig::new(id("a"));
        config.version = "2.0.0".to_string();
        assert!(registry.insert(config).is_some());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id("a")).unwrap().version, "2.0.0");
    }

    #[test]
    fn registry_update_config_item_merges() {
        let registry = ModuleRegistry::new();
        let mut config = ModuleConfig::new(id("a"));
        config.config_item.config_schema = "schema".to_string();
        config.config_item.current_config = "old".to_string();
        registry.insert(config);

        let merged = registry
            .update_config_item(
                &id("a"),
                &ConfigItemUpdate {
                    current_config: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(merged.config_item.current_config, "new");
        assert_eq!(merged.config_item.config_schema, "schema");
        assert_eq!(registry.get(&id("a")).unwrap(), merged);
    }

    #[test]
    fn registry_update_unknown_module() {
        let registry = ModuleRegistry::new();
        let result = registry.update_config_item(&id("x"), &ConfigItemUpdate::default());
        assert!(matches!(result, Err(CoreError::ModuleNotFound(_))));
    }

    #[test]
    fn registry_remove_and_clear() {
        let registry = ModuleRegistry::new();
        registry.insert(ModuleConfig::new(id("b")));
        registry.insert(ModuleConfig::new(id("a")));
        assert_eq!(registry.ids(), vec![id("a"), id("b")]);

        assert!(registry.remove(&id("a")).is_some());
        assert!(registry.remove(&id("a")).is_none());

        registry.clear();
        assert!(registry.is_empty());
    }
}
