//! Protobuf wire messages.
//!
//! Every message between the agent and the server is a [`Message`] whose
//! `payload` holds one of the typed messages below, selected by
//! [`MessageType`]. Config item fields are `optional` so that a field that
//! was not sent can be told apart from a field sent as an empty string.

/// Top-level envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    /// Kind of the payload.
    #[prost(enumeration = "MessageType", tag = "1")]
    pub r#type: i32,
    /// Encoded typed message.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

/// Kinds of envelope payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    /// Not set.
    Unspecified = 0,
    /// Request host and agent identity. Empty payload.
    GetInformation = 1,
    /// Request module statuses. Empty payload.
    GetStatusModules = 2,
    /// Start modules. Payload: [`ModuleList`].
    StartModules = 3,
    /// Stop modules. Payload: [`ModuleList`], only names are read.
    StopModules = 4,
    /// Replace modules. Payload: [`ModuleList`].
    UpdateModules = 5,
    /// Update module config items in place. Payload: [`ModuleList`].
    UpdateConfigModules = 6,
    /// Identity answer. Payload: [`Information`].
    InformationResult = 7,
    /// Status answer. Payload: [`ModuleStatusList`].
    StatusModulesResult = 8,
}

/// A batch of modules.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleList {
    /// Modules in processing order.
    #[prost(message, repeated, tag = "1")]
    pub list: Vec<Module>,
}

/// One module as sent by the server.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Module {
    /// Module name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Declared configuration.
    #[prost(message, optional, tag = "2")]
    pub config: Option<Config>,
    /// Config documents.
    #[prost(message, optional, tag = "3")]
    pub config_item: Option<ConfigItem>,
    /// Embedded files.
    #[prost(message, repeated, tag = "4")]
    pub files: Vec<ModuleFile>,
    /// Arguments.
    #[prost(message, repeated, tag = "5")]
    pub args: Vec<ModuleArg>,
}

/// Declared module configuration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Config {
    /// Supported operating systems.
    #[prost(message, repeated, tag = "1")]
    pub os: Vec<ConfigOs>,
    /// Agent the module was built for.
    #[prost(string, tag = "2")]
    pub agent_id: String,
    /// Module name.
    #[prost(string, tag = "3")]
    pub name: String,
    /// Semantic version.
    #[prost(string, tag = "4")]
    pub version: String,
    /// Event subscriptions.
    #[prost(string, repeated, tag = "5")]
    pub events: Vec<String>,
    /// Last-update timestamp.
    #[prost(string, tag = "6")]
    pub last_update: String,
}

/// One supported OS and its architectures.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigOs {
    /// OS type.
    #[prost(string, tag = "1")]
    pub r#type: String,
    /// Supported architectures.
    #[prost(string, repeated, tag = "2")]
    pub arch: Vec<String>,
}

/// Module config documents.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigItem {
    /// Schema of the module configuration.
    #[prost(string, optional, tag = "1")]
    pub config_schema: Option<String>,
    /// Default module configuration.
    #[prost(string, optional, tag = "2")]
    pub default_config: Option<String>,
    /// Current module configuration.
    #[prost(string, optional, tag = "3")]
    pub current_config: Option<String>,
    /// Schema of the emitted event data.
    #[prost(string, optional, tag = "4")]
    pub event_data_schema: Option<String>,
    /// Schema of the event configuration.
    #[prost(string, optional, tag = "5")]
    pub event_config_schema: Option<String>,
    /// Default event configuration.
    #[prost(string, optional, tag = "6")]
    pub default_event_config: Option<String>,
    /// Current event configuration.
    #[prost(string, optional, tag = "7")]
    pub current_event_config: Option<String>,
}

/// An embedded file.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleFile {
    /// Relative path.
    #[prost(string, tag = "1")]
    pub path: String,
    /// Contents.
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// A named argument.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleArg {
    /// Argument name.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Argument values.
    #[prost(string, repeated, tag = "2")]
    pub value: Vec<String>,
}

/// Status answer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleStatusList {
    /// Per-module statuses.
    #[prost(message, repeated, tag = "1")]
    pub list: Vec<ModuleStatus>,
}

/// Status of one module.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleStatus {
    /// Module name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Registered configuration.
    #[prost(message, optional, tag = "2")]
    pub config: Option<Config>,
    /// Registered config documents.
    #[prost(message, optional, tag = "3")]
    pub config_item: Option<ConfigItem>,
    /// Instance status.
    #[prost(enumeration = "Status", tag = "4")]
    pub status: i32,
}

/// Instance status values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Status {
    /// Unknown.
    Unknown = 0,
    /// Running.
    Running = 1,
    /// Stopped.
    Stopped = 2,
    /// Failed.
    Failed = 3,
}

/// Identity answer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Information {
    /// Agent identity.
    #[prost(string, tag = "1")]
    pub agent_id: String,
    /// Agent version.
    #[prost(string, tag = "2")]
    pub version: String,
    /// Operating system.
    #[prost(message, optional, tag = "3")]
    pub os: Option<InformationOs>,
    /// Network.
    #[prost(message, optional, tag = "4")]
    pub net: Option<InformationNet>,
    /// Process start time, RFC 3339.
    #[prost(string, tag = "5")]
    pub started_at: String,
}

/// Operating system part of [`Information`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InformationOs {
    /// OS type.
    #[prost(string, tag = "1")]
    pub r#type: String,
    /// OS family.
    #[prost(string, tag = "2")]
    pub family: String,
    /// CPU architecture.
    #[prost(string, tag = "3")]
    pub arch: String,
}

/// Network part of [`Information`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InformationNet {
    /// Host name.
    #[prost(string, tag = "1")]
    pub hostname: String,
    /// IP addresses.
    #[prost(string, repeated, tag = "2")]
    pub ips: Vec<String>,
}
