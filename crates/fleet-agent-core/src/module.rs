//! Module domain types.
//!
//! These types describe a managed module as the server declares it
//! ([`ModuleConfig`], [`ConfigItem`]), the auxiliary payload needed to
//! materialize it ([`ModuleItem`]), and the status reported back
//! ([`ModuleStatusEntry`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ModuleId;

/// Identity and metadata of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Unique module name.
    pub name: ModuleId,
    /// Agent the module was built for.
    #[serde(default)]
    pub agent_id: String,
    /// Supported operating systems mapped to their supported architectures.
    #[serde(default)]
    pub os: BTreeMap<String, Vec<String>>,
    /// Semantic version string.
    #[serde(default)]
    pub version: String,
    /// Declared event-type subscriptions.
    #[serde(default)]
    pub events: Vec<String>,
    /// Last-update timestamp as sent by the server.
    #[serde(default)]
    pub last_update: String,
    /// Schemas and current values of the module configuration.
    #[serde(default)]
    pub config_item: ConfigItem,
}

impl ModuleConfig {
    /// Create an empty configuration for the given module.
    #[must_use]
    pub fn new(name: ModuleId) -> Self {
        Self {
            name,
            agent_id: String::new(),
            os: BTreeMap::new(),
            version: String::new(),
            events: Vec::new(),
            last_update: String::new(),
            config_item: ConfigItem::default(),
        }
    }
}

/// Opaque configuration documents of a module.
///
/// The agent never interprets these; the module validates them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Schema of the module configuration.
    pub config_schema: String,
    /// Default module configuration.
    pub default_config: String,
    /// Current module configuration.
    pub current_config: String,
    /// Schema of the event data the module emits.
    pub event_data_schema: String,
    /// Schema of the event configuration.
    pub event_config_schema: String,
    /// Default event configuration.
    pub default_event_config: String,
    /// Current event configuration.
    pub current_event_config: String,
}

impl ConfigItem {
    /// Overwrite every field that is present in `update`.
    ///
    /// Absent fields keep their stored value. A field sent as an empty
    /// string is present and clears the stored value.
    pub fn apply(&mut self, update: &ConfigItemUpdate) {
        fn set(target: &mut String, value: Option<&String>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        set(&mut self.config_schema, update.config_schema.as_ref());
        set(&mut self.default_config, update.default_config.as_ref());
        set(&mut self.current_config, update.current_config.as_ref());
        set(&mut self.event_data_schema, update.event_data_schema.as_ref());
        set(&mut self.event_config_schema, update.event_config_schema.as_ref());
        set(&mut self.default_event_config, update.default_event_config.as_ref());
        set(&mut self.current_event_config, update.current_event_config.as_ref());
    }
}

/// A config item as received, with field presence preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItemUpdate {
    /// Schema of the module configuration.
    pub config_schema: Option<String>,
    /// Default module configuration.
    pub default_config: Option<String>,
    /// Current module configuration.
    pub current_config: Option<String>,
    /// Schema of the event data the module emits.
    pub event_data_schema: Option<String>,
    /// Schema of the event configuration.
    pub event_config_schema: Option<String>,
    /// Default event configuration.
    pub default_event_config: Option<String>,
    /// Current event configuration.
    pub current_event_config: Option<String>,
}

impl ConfigItemUpdate {
    /// Build a full config item, treating absent fields as empty.
    #[must_use]
    pub fn to_item(&self) -> ConfigItem {
        let mut item = ConfigItem::default();
        item.apply(self);
        item
    }

    /// Returns true if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&ConfigItem> for ConfigItemUpdate {
    fn from(item: &ConfigItem) -> Self {
        Self {
            config_schema: Some(item.config_schema.clone()),
            default_config: Some(item.default_config.clone()),
            current_config: Some(item.current_config.clone()),
            event_data_schema: Some(item.event_data_schema.clone()),
            event_config_schema: Some(item.event_config_schema.clone()),
            default_event_config: Some(item.default_event_config.clone()),
            current_event_config: Some(item.current_event_config.clone()),
        }
    }
}

/// Embedded files and arguments needed to materialize a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleItem {
    /// File contents keyed by relative path.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Arguments keyed by name.
    pub args: BTreeMap<String, Vec<String>>,
}

/// One entry of a start, update or update-config batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Declared configuration; absent config item fields are empty.
    pub config: ModuleConfig,
    /// The config item exactly as received.
    pub config_item: ConfigItemUpdate,
    /// Embedded files and arguments.
    pub item: ModuleItem,
}

impl ModuleSpec {
    /// Create a spec from a configuration, with every config item field
    /// present and no files or arguments.
    #[must_use]
    pub fn new(config: ModuleConfig) -> Self {
        let config_item = ConfigItemUpdate::from(&config.config_item);
        Self {
            config,
            config_item,
            item: ModuleItem::default(),
        }
    }

    /// The module this spec targets.
    #[must_use]
    pub fn id(&self) -> &ModuleId {
        &self.config.name
    }

    /// Build the loader state for this spec.
    #[must_use]
    pub fn to_state(&self) -> ModuleState {
        ModuleState {
            config: self.config.clone(),
            item: self.item.clone(),
        }
    }
}

/// Everything the loader needs to materialize and run one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleState {
    /// Declared configuration.
    pub config: ModuleConfig,
    /// Embedded files and arguments.
    pub item: ModuleItem,
}

/// Lifecycle status of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ModuleStatus {
    /// Status cannot be determined.
    #[default]
    Unknown = 0,
    /// Instance is running.
    Running = 1,
    /// Instance is stopped.
    Stopped = 2,
    /// Instance failed.
    Failed = 3,
}

impl ModuleStatus {
    /// Convert the status to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `ModuleStatus`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Running),
            2 => Some(Self::Stopped),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Status of one module as reported to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatusEntry {
    /// Module name.
    pub name: ModuleId,
    /// Registered configuration snapshot.
    pub config: ModuleConfig,
    /// Status of the loader instance.
    pub status: ModuleStatus,
}
