//! Conversion between wire envelopes and agent commands and responses.
//!
//! Decoding is split in two steps. [`Envelope::decode`] reads the outer
//! message and its [`CommandKind`]; [`Envelope::into_command`] then decodes
//! the typed payload. Callers can therefore still tell which batch a
//! malformed module list belonged to.
//!
//! Module entries are checked one by one. An entry with an unusable name
//! becomes an [`InvalidEntry`] at its position in the [`Batch`] instead of
//! failing the whole list.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use fleet_agent_core::{
    AgentInformation, ConfigItemUpdate, ModuleConfig, ModuleId, ModuleItem, ModuleSpec,
    ModuleStatus, ModuleStatusEntry, NetInfo, OsInfo,
};
use prost::Message as _;

use crate::error::{CodecError, InvalidEntry, Result};
use crate::wire::{self, MessageType};

/// The closed set of commands the agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Report host and agent identity.
    GetInformation,
    /// Report module statuses.
    GetStatusModules,
    /// Start a batch of modules.
    StartModules,
    /// Stop a batch of modules.
    StopModules,
    /// Replace a batch of modules.
    UpdateModules,
    /// Update config items of running modules.
    UpdateConfigModules,
}

impl CommandKind {
    /// Returns true for commands that carry a module batch and always answer
    /// with a status response.
    #[must_use]
    pub const fn is_batch(self) -> bool {
        matches!(
            self,
            Self::StartModules | Self::StopModules | Self::UpdateModules | Self::UpdateConfigModules
        )
    }

    /// The wire type of this command.
    #[must_use]
    pub const fn message_type(self) -> MessageType {
        match self {
            Self::GetInformation => MessageType::GetInformation,
            Self::GetStatusModules => MessageType::GetStatusModules,
            Self::StartModules => MessageType::StartModules,
            Self::StopModules => MessageType::StopModules,
            Self::UpdateModules => MessageType::UpdateModules,
            Self::UpdateConfigModules => MessageType::UpdateConfigModules,
        }
    }

    const fn from_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::GetInformation => Some(Self::GetInformation),
            MessageType::GetStatusModules => Some(Self::GetStatusModules),
            MessageType::StartModules => Some(Self::StartModules),
            MessageType::StopModules => Some(Self::StopModules),
            MessageType::UpdateModules => Some(Self::UpdateModules),
            MessageType::UpdateConfigModules => Some(Self::UpdateConfigModules),
            MessageType::Unspecified
            | MessageType::InformationResult
            | MessageType::StatusModulesResult => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetInformation => "get_information",
            Self::GetStatusModules => "get_status_modules",
            Self::StartModules => "start_modules",
            Self::StopModules => "stop_modules",
            Self::UpdateModules => "update_modules",
            Self::UpdateConfigModules => "update_config_modules",
        };
        f.write_str(name)
    }
}

/// One entry of a module batch.
pub type BatchEntry<T> = std::result::Result<T, InvalidEntry>;

/// The modules of a batch command, in received order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    entries: Vec<BatchEntry<T>>,
}

impl<T> Batch<T> {
    /// Create a batch from already checked entries.
    #[must_use]
    pub const fn new(entries: Vec<BatchEntry<T>>) -> Self {
        Self { entries }
    }

    /// The entries, in received order.
    #[must_use]
    pub fn entries(&self) -> &[BatchEntry<T>] {
        &self.entries
    }

    /// Iterate over the entries in received order.
    pub fn iter(&self) -> std::slice::Iter<'_, BatchEntry<T>> {
        self.entries.iter()
    }

    /// Number of entries, invalid ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> From<Vec<T>> for Batch<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items.into_iter().map(Ok).collect())
    }
}

impl<T> FromIterator<BatchEntry<T>> for Batch<T> {
    fn from_iter<I: IntoIterator<Item = BatchEntry<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a BatchEntry<T>;
    type IntoIter = std::slice::Iter<'a, BatchEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report host and agent identity.
    GetInformation,
    /// Report module statuses.
    GetStatusModules,
    /// Start each module, in order.
    StartModules(Batch<ModuleSpec>),
    /// Stop each named module, in order.
    StopModules(Batch<ModuleId>),
    /// Stop and restart each module with its new spec, in order.
    UpdateModules(Batch<ModuleSpec>),
    /// Merge config items into running modules, in order.
    UpdateConfigModules(Batch<ModuleSpec>),
}

impl Command {
    /// The kind of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::GetInformation => CommandKind::GetInformation,
            Self::GetStatusModules => CommandKind::GetStatusModules,
            Self::StartModules(_) => CommandKind::StartModules,
            Self::StopModules(_) => CommandKind::StopModules,
            Self::UpdateModules(_) => CommandKind::UpdateModules,
            Self::UpdateConfigModules(_) => CommandKind::UpdateConfigModules,
        }
    }

    /// Encode the command as the server would send it.
    ///
    /// Invalid entries are written with only their raw name.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if marshaling fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Self::GetInformation | Self::GetStatusModules => Vec::new(),
            Self::StartModules(specs)
            | Self::UpdateModules(specs)
            | Self::UpdateConfigModules(specs) => marshal(&wire::ModuleList {
                list: specs
                    .iter()
                    .map(|entry| match entry {
                        Ok(spec) => module_to_wire(spec),
                        Err(invalid) => named_module(&invalid.name),
                    })
                    .collect(),
            })?,
            Self::StopModules(names) => marshal(&wire::ModuleList {
                list: names
                    .iter()
                    .map(|entry| match entry {
                        Ok(name) => named_module(name.as_str()),
                        Err(invalid) => named_module(&invalid.name),
                    })
                    .collect(),
            })?,
        };
        encode_envelope(self.kind().message_type(), payload)
    }
}

/// A decoded envelope whose payload has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: CommandKind,
    payload: Vec<u8>,
}

impl Envelope {
    /// Decode the outer envelope of an inbound command.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid envelope or the message
    /// type is not an inbound command.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let message = wire::Message::decode(data).map_err(CodecError::Envelope)?;
        let message_type = MessageType::try_from(message.r#type)
            .map_err(|_| CodecError::UnknownMessageType(message.r#type))?;
        let kind = CommandKind::from_message_type(message_type)
            .ok_or(CodecError::UnexpectedMessageType(message_type))?;

        Ok(Self {
            kind,
            payload: message.payload,
        })
    }

    /// The command kind announced by the envelope.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Decode the typed payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::ModuleList` if the module list cannot be decoded.
    /// Unusable entries do not fail the command.
    pub fn into_command(self) -> Result<Command> {
        let command = match self.kind {
            CommandKind::GetInformation => Command::GetInformation,
            CommandKind::GetStatusModules => Command::GetStatusModules,
            CommandKind::StartModules => Command::StartModules(decode_specs(&self.payload)?),
            CommandKind::StopModules => Command::StopModules(decode_names(&self.payload)?),
            CommandKind::UpdateModules => Command::UpdateModules(decode_specs(&self.payload)?),
            CommandKind::UpdateConfigModules => {
                Command::UpdateConfigModules(decode_specs(&self.payload)?)
            }
        };
        Ok(command)
    }
}

/// Decode an inbound command in one step.
///
/// # Errors
///
/// Returns any error of [`Envelope::decode`] or [`Envelope::into_command`].
pub fn decode_command(data: &[u8]) -> Result<Command> {
    Envelope::decode(data)?.into_command()
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Answer to a get-information command.
    Information(AgentInformation),
    /// Module statuses.
    StatusModules(Vec<ModuleStatusEntry>),
}

impl Response {
    /// The wire type of this response.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Information(_) => MessageType::InformationResult,
            Self::StatusModules(_) => MessageType::StatusModulesResult,
        }
    }

    /// Encode the response envelope.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if marshaling fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Self::Information(info) => marshal(&information_to_wire(info))?,
            Self::StatusModules(entries) => marshal(&wire::ModuleStatusList {
                list: entries.iter().map(status_to_wire).collect(),
            })?,
        };
        encode_envelope(self.message_type(), payload)
    }

    /// Decode a response envelope as the server would.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid response.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let message = wire::Message::decode(data).map_err(CodecError::Envelope)?;
        let message_type = MessageType::try_from(message.r#type)
            .map_err(|_| CodecError::UnknownMessageType(message.r#type))?;

        match message_type {
            MessageType::InformationResult => {
                let info = wire::Information::decode(message.payload.as_slice())
                    .map_err(CodecError::Payload)?;
                Ok(Self::Information(information_from_wire(info)?))
            }
            MessageType::StatusModulesResult => {
                let list = wire::ModuleStatusList::decode(message.payload.as_slice())
                    .map_err(CodecError::Payload)?;
                let entries = list
                    .list
                    .into_iter()
                    .map(status_from_wire)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::StatusModules(entries))
            }
            other => Err(CodecError::UnexpectedMessageType(other)),
        }
    }
}

fn marshal<M: prost::Message>(message: &M) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;
    Ok(buf)
}

fn encode_envelope(message_type: MessageType, payload: Vec<u8>) -> Result<Vec<u8>> {
    marshal(&wire::Message {
        r#type: message_type as i32,
        payload,
    })
}

fn decode_module_list(payload: &[u8]) -> Result<wire::ModuleList> {
    wire::ModuleList::decode(payload).map_err(CodecError::ModuleList)
}

fn decode_specs(payload: &[u8]) -> Result<Batch<ModuleSpec>> {
    Ok(decode_module_list(payload)?
        .list
        .into_iter()
        .map(module_from_wire)
        .collect())
}

fn decode_names(payload: &[u8]) -> Result<Batch<ModuleId>> {
    Ok(decode_module_list(payload)?
        .list
        .iter()
        .map(module_name)
        .collect())
}

/// The module name is the entry name, falling back to the config name.
fn module_name(module: &wire::Module) -> BatchEntry<ModuleId> {
    let name = if module.name.is_empty() {
        module.config.as_ref().map_or("", |c| c.name.as_str())
    } else {
        module.name.as_str()
    };
    ModuleId::new(name).map_err(|e| InvalidEntry {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn named_module(name: &str) -> wire::Module {
    wire::Module {
        name: name.to_string(),
        ..Default::default()
    }
}

fn module_from_wire(module: wire::Module) -> BatchEntry<ModuleSpec> {
    let id = module_name(&module)?;
    let config_item = module
        .config_item
        .map(config_item_from_wire)
        .unwrap_or_default();

    let mut config = config_from_wire(id, module.config.unwrap_or_default());
    config.config_item = config_item.to_item();

    let item = ModuleItem {
        files: module
            .files
            .into_iter()
            .map(|file| (file.path, file.data))
            .collect(),
        args: module
            .args
            .into_iter()
            .map(|arg| (arg.key, arg.value))
            .collect(),
    };

    Ok(ModuleSpec {
        config,
        config_item,
        item,
    })
}

fn module_to_wire(spec: &ModuleSpec) -> wire::Module {
    wire::Module {
        name: spec.id().to_string(),
        config: Some(config_to_wire(&spec.config)),
        config_item: Some(config_item_to_wire(&spec.config_item)),
        files: spec
            .item
            .files
            .iter()
            .map(|(path, data)| wire::ModuleFile {
                path: path.clone(),
                data: data.clone(),
            })
            .collect(),
        args: spec
            .item
            .args
            .iter()
            .map(|(key, value)| wire::ModuleArg {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
    }
}

fn config_from_wire(name: ModuleId, config: wire::Config) -> ModuleConfig {
    let mut os = BTreeMap::new();
    for entry in config.os {
        os.insert(entry.r#type, entry.arch);
    }

    ModuleConfig {
        name,
        agent_id: config.agent_id,
        os,
        version: config.version,
        events: config.events,
        last_update: config.last_update,
        config_item: fleet_agent_core::ConfigItem::default(),
    }
}

fn config_to_wire(config: &ModuleConfig) -> wire::Config {
    wire::Config {
        os: config
            .os
            .iter()
            .map(|(kind, arch)| wire::ConfigOs {
                r#type: kind.clone(),
                arch: arch.clone(),
            })
            .collect(),
        agent_id: config.agent_id.clone(),
        name: config.name.to_string(),
        version: config.version.clone(),
        events: config.events.clone(),
        last_update: config.last_update.clone(),
    }
}

fn config_item_from_wire(item: wire::ConfigItem) -> ConfigItemUpdate {
    ConfigItemUpdate {
        config_schema: item.config_schema,
        default_config: item.default_config,
        current_config: item.current_config,
        event_data_schema: item.event_data_schema,
        event_config_schema: item.event_config_schema,
        default_event_config: item.default_event_config,
        current_event_config: item.current_event_config,
    }
}

fn config_item_to_wire(item: &ConfigItemUpdate) -> wire::ConfigItem {
    wire::ConfigItem {
        config_schema: item.config_schema.clone(),
        default_config: item.default_config.clone(),
        current_config: item.current_config.clone(),
        event_data_schema: item.event_data_schema.clone(),
        event_config_schema: item.event_config_schema.clone(),
        default_event_config: item.default_event_config.clone(),
        current_event_config: item.current_event_config.clone(),
    }
}

fn status_to_wire(entry: &ModuleStatusEntry) -> wire::ModuleStatus {
    let status = match entry.status {
        ModuleStatus::Unknown => wire::Status::Unknown,
        ModuleStatus::Running => wire::Status::Running,
        ModuleStatus::Stopped => wire::Status::Stopped,
        ModuleStatus::Failed => wire::Status::Failed,
    };

    wire::ModuleStatus {
        name: entry.name.to_string(),
        config: Some(config_to_wire(&entry.config)),
        config_item: Some(config_item_to_wire(&ConfigItemUpdate::from(
            &entry.config.config_item,
        ))),
        status: status as i32,
    }
}

fn status_from_wire(status: wire::ModuleStatus) -> Result<ModuleStatusEntry> {
    let name = ModuleId::new(status.name.as_str()).map_err(|e| InvalidEntry {
        name: status.name.clone(),
        reason: e.to_string(),
    })?;
    let value = u8::try_from(status.status)
        .ok()
        .and_then(ModuleStatus::from_u8)
        .unwrap_or_default();

    let mut config = config_from_wire(name.clone(), status.config.unwrap_or_default());
    config.config_item = status
        .config_item
        .map(config_item_from_wire)
        .unwrap_or_default()
        .to_item();

    Ok(ModuleStatusEntry {
        name,
        config,
        status: value,
    })
}

fn information_to_wire(info: &AgentInformation) -> wire::Information {
    wire::Information {
        agent_id: info.agent_id.clone(),
        version: info.version.clone(),
        os: Some(wire::InformationOs {
            r#type: info.os.kind.clone(),
            family: info.os.family.clone(),
            arch: info.os.arch.clone(),
        }),
        net: Some(wire::InformationNet {
            hostname: info.net.hostname.clone(),
            ips: info.net.ips.clone(),
        }),
        started_at: info.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn information_from_wire(info: wire::Information) -> Result<AgentInformation> {
    let started_at = DateTime::parse_from_rfc3339(&info.started_at)
        .map_err(|e| CodecError::InvalidField {
            field: "started_at",
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);
    let os = info.os.unwrap_or_default();
    let net = info.net.unwrap_or_default();

    Ok(AgentInformation {
        agent_id: info.agent_id,
        version: info.version,
        os: OsInfo {
            kind: os.r#type,
            family: os.family,
            arch: os.arch,
        },
        net: NetInfo {
            hostname: net.hostname,
            ips: net.ips,
        },
        started_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(name).unwrap()
    }

    fn envelope(message_type: i32, payload: Vec<u8>) -> Vec<u8> {
        wire::Message {
            r#type: message_type,
            payload,
        }
        .encode_to_vec()
    }

    fn module_list(list: Vec<wire::Module>) -> Vec<u8> {
        wire::ModuleList { list }.encode_to_vec()
    }

    #[test]
    fn decode_get_commands() {
        let data = envelope(MessageType::GetInformation as i32, Vec::new());
        assert_eq!(decode_command(&data).unwrap(), Command::GetInformation);

        let data = envelope(MessageType::GetStatusModules as i32, Vec::new());
        assert_eq!(decode_command(&data).unwrap(), Command::GetStatusModules);
    }

    #[test]
    fn decode_start_modules_preserves_order_and_payload() {
        let payload = module_list(vec![
            wire::Module {
                name: "b".to_string(),
                config: Some(wire::Config {
                    os: vec![wire::ConfigOs {
                        r#type: "linux".to_string(),
                        arch: vec!["amd64".to_string()],
                    }],
                    version: "1.2.0".to_string(),
                    events: vec!["file_created".to_string()],
                    ..Default::default()
                }),
                config_item: Some(wire::ConfigItem {
                    current_config: Some("{\"depth\":2}".to_string()),
                    ..Default::default()
                }),
                files: vec![wire::ModuleFile {
                    path: "bin/main.lua".to_string(),
                    data: b"print(1)".to_vec(),
                }],
                args: vec![wire::ModuleArg {
                    key: "paths".to_string(),
                    value: vec!["/tmp".to_string(), "/var".to_string()],
                }],
            },
            wire::Module {
                name: "a".to_string(),
                ..Default::default()
            },
        ]);
        let data = envelope(MessageType::StartModules as i32, payload);

        let Command::StartModules(batch) = decode_command(&data).unwrap() else {
            panic!("expected StartModules");
        };
        let specs: Vec<&ModuleSpec> = batch.iter().map(|e| e.as_ref().unwrap()).collect();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].id(), &id("b"));
        assert_eq!(specs[1].id(), &id("a"));

        let first = specs[0];
        assert_eq!(first.config.version, "1.2.0");
        assert_eq!(first.config.os["linux"], vec!["amd64".to_string()]);
        assert_eq!(first.config.config_item.current_config, "{\"depth\":2}");
        assert_eq!(first.config_item.current_config.as_deref(), Some("{\"depth\":2}"));
        assert_eq!(first.config_item.config_schema, None);
        assert_eq!(first.item.files["bin/main.lua"], b"print(1)".to_vec());
        assert_eq!(first.item.args["paths"].len(), 2);
    }

    #[test]
    fn decode_stop_modules_reads_names() {
        let payload = module_list(vec![
            wire::Module {
                name: "a".to_string(),
                ..Default::default()
            },
            wire::Module {
                config: Some(wire::Config {
                    name: "b".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]);
        let data = envelope(MessageType::StopModules as i32, payload);

        assert_eq!(
            decode_command(&data).unwrap(),
            Command::StopModules(vec![id("a"), id("b")].into())
        );
    }

    #[test]
    fn invalid_names_are_rejected_per_entry() {
        let payload = module_list(vec![
            named_module("a"),
            named_module("bad/name"),
            wire::Module::default(),
            named_module("b"),
        ]);
        let data = envelope(MessageType::StopModules as i32, payload);

        let Command::StopModules(batch) = decode_command(&data).unwrap() else {
            panic!("expected StopModules");
        };
        let entries = batch.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], Ok(id("a")));
        assert_eq!(entries[3], Ok(id("b")));

        let bad = entries[1].as_ref().unwrap_err();
        assert_eq!(bad.name, "bad/name");
        assert!(bad.to_string().starts_with("invalid module \"bad/name\""));
        assert_eq!(entries[2].as_ref().unwrap_err().name, "");
    }

    #[test]
    fn invalid_entries_encode_by_raw_name() {
        let batch = Batch::new(vec![
            Ok(ModuleSpec::new(ModuleConfig::new(id("a")))),
            Err(InvalidEntry {
                name: "bad/name".to_string(),
                reason: "rejected".to_string(),
            }),
        ]);
        let data = Command::StartModules(batch).encode().unwrap();

        let Command::StartModules(decoded) = decode_command(&data).unwrap() else {
            panic!("expected StartModules");
        };
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.entries()[0].as_ref().unwrap().id(), &id("a"));
        assert_eq!(decoded.entries()[1].as_ref().unwrap_err().name, "bad/name");
    }

    #[test]
    fn decode_rejects_unknown_and_response_types() {
        let data = envelope(42, Vec::new());
        assert!(matches!(
            Envelope::decode(&data),
            Err(CodecError::UnknownMessageType(42))
        ));

        let data = envelope(MessageType::StatusModulesResult as i32, Vec::new());
        assert!(matches!(
            Envelope::decode(&data),
            Err(CodecError::UnexpectedMessageType(
                MessageType::StatusModulesResult
            ))
        ));
    }

    #[test]
    fn decode_rejects_garbage_envelope() {
        assert!(matches!(
            Envelope::decode(&[0xff, 0xff, 0xff]),
            Err(CodecError::Envelope(_))
        ));
    }

    #[test]
    fn malformed_module_list_keeps_batch_kind() {
        let data = envelope(MessageType::UpdateModules as i32, vec![0x0a, 0x05, 0x01]);

        let envelope = Envelope::decode(&data).unwrap();
        assert_eq!(envelope.kind(), CommandKind::UpdateModules);
        assert!(envelope.kind().is_batch());

        let err = envelope.into_command().unwrap_err();
        assert!(matches!(err, CodecError::ModuleList(_)));
        assert!(err
            .to_string()
            .starts_with("error unmarshal of modules information"));
    }

    #[test]
    fn update_config_command_survives_encoding() {
        let mut config = ModuleConfig::new(id("scanner"));
        config.version = "0.3.1".to_string();
        let spec = ModuleSpec {
            config_item: ConfigItemUpdate {
                current_config: Some(String::new()),
                ..Default::default()
            },
            ..ModuleSpec::new(config)
        };

        let data = Command::UpdateConfigModules(vec![spec].into()).encode().unwrap();
        let Command::UpdateConfigModules(batch) = decode_command(&data).unwrap() else {
            panic!("expected UpdateConfigModules");
        };
        let spec = batch.entries()[0].as_ref().unwrap();

        // Presence survives: a field sent as empty is still present.
        assert_eq!(spec.config_item.current_config.as_deref(), Some(""));
        assert_eq!(spec.config_item.default_config, None);
        assert_eq!(spec.config.version, "0.3.1");
    }

    #[test]
    fn status_response_encodes_registered_config() {
        let mut config = ModuleConfig::new(id("b"));
        config.config_item.current_config = "{}".to_string();
        let response = Response::StatusModules(vec![ModuleStatusEntry {
            name: id("b"),
            config,
            status: ModuleStatus::Running,
        }]);

        let data = response.encode().unwrap();
        let message = wire::Message::decode(data.as_slice()).unwrap();
        assert_eq!(message.r#type(), MessageType::StatusModulesResult);

        let list = wire::ModuleStatusList::decode(message.payload.as_slice()).unwrap();
        assert_eq!(list.list[0].name, "b");
        assert_eq!(list.list[0].status(), wire::Status::Running);
        assert_eq!(
            list.list[0]
                .config_item
                .as_ref()
                .and_then(|c| c.current_config.as_deref()),
            Some("{}")
        );

        assert_eq!(Response::decode(&data).unwrap(), response);
    }

    #[test]
    fn information_response_carries_start_time() {
        let info = AgentInformation {
            agent_id: "agent-1".to_string(),
            version: "0.1.0".to_string(),
            os: OsInfo {
                kind: "linux".to_string(),
                family: "unix".to_string(),
                arch: "x86_64".to_string(),
            },
            net: NetInfo {
                hostname: "node-7".to_string(),
                ips: Vec::new(),
            },
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let response = Response::Information(info);
        let data = response.encode().unwrap();
        assert_eq!(Response::decode(&data).unwrap(), response);
    }

    #[test]
    fn response_decode_rejects_commands() {
        let data = Command::GetInformation.encode().unwrap();
        assert!(matches!(
            Response::decode(&data),
            Err(CodecError::UnexpectedMessageType(MessageType::GetInformation))
        ));
    }
}
