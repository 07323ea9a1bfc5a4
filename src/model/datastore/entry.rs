use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an entry inside one [`Datastore`](super::Datastore).
///
/// Ids are never reused, not even across `clear()`, so a stale id fails to
/// resolve instead of silently reaching a newer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry({})", self.0)
    }
}

/// Kind of watchable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Variable read from device memory
    Var,
    /// User-defined alias over another watchable
    Alias,
    /// Runtime published value
    Rpv,
}

impl EntryType {
    pub const ALL: [EntryType; 3] = [EntryType::Var, EntryType::Alias, EntryType::Rpv];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Var => "var",
            EntryType::Alias => "alias",
            EntryType::Rpv => "rpv",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded value type of a watchable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Sint8,
    Sint16,
    Sint32,
    Sint64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Boolean,
}

impl DataType {
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DataType::Sint8 | DataType::Sint16 | DataType::Sint32 | DataType::Sint64
        ) || self.is_float()
    }
}

/// Named integer constants attached to an integer watchable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub values: BTreeMap<String, i64>,
}

impl EnumDefinition {
    /// Name of the constant with the given value, if any
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(k, _)| k.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

/// Backend-supplied description of one watchable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDefinition {
    /// Opaque backend id
    pub id: String,
    pub display_path: String,
    pub datatype: DataType,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_definition: Option<EnumDefinition>,
}

impl EntryDefinition {
    pub fn new(id: &str, display_path: &str, datatype: DataType) -> Self {
        Self {
            id: id.to_string(),
            display_path: display_path.to_string(),
            datatype,
            enum_definition: None,
        }
    }

    pub fn with_enum(mut self, enum_definition: EnumDefinition) -> Self {
        self.enum_definition = Some(enum_definition);
        self
    }
}

/// Opaque identity of a value consumer (typically a row id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(pub String);

impl From<&str> for WatcherId {
    fn from(s: &str) -> Self {
        WatcherId(s.to_string())
    }
}

impl From<String> for WatcherId {
    fn from(s: String) -> Self {
        WatcherId(s)
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a watch callback receives on every value change
#[derive(Debug)]
pub struct WatchUpdate<'a> {
    pub entry_id: EntryId,
    pub server_id: &'a str,
    pub display_path: &'a str,
    pub watcher: &'a WatcherId,
    pub value: &'a Value,
}

pub type WatchCallback = Box<dyn FnMut(&WatchUpdate<'_>)>;

/// Client-side record of one watchable
pub struct DatastoreEntry {
    pub(super) id: EntryId,
    pub(super) entry_type: EntryType,
    pub(super) server_id: String,
    pub(super) display_path: String,
    pub(super) datatype: DataType,
    pub(super) enum_definition: Option<EnumDefinition>,
    pub(super) value: Option<Value>,
    /// (watcher, callback) pairs in registration order
    pub(super) watchers: Vec<(WatcherId, WatchCallback)>,
}

impl DatastoreEntry {
    pub(super) fn new(id: EntryId, entry_type: EntryType, definition: EntryDefinition) -> Self {
        Self {
            id,
            entry_type,
            server_id: definition.id,
            display_path: definition.display_path,
            datatype: definition.datatype,
            enum_definition: definition.enum_definition,
            value: None,
            watchers: Vec::new(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn enum_definition(&self) -> Option<&EnumDefinition> {
        self.enum_definition.as_ref()
    }

    /// Last known value; `None` means unknown
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Distinct watchers, in first-registration order
    pub fn watchers(&self) -> Vec<&WatcherId> {
        let mut seen: Vec<&WatcherId> = Vec::new();
        for (watcher, _) in &self.watchers {
            if !seen.contains(&watcher) {
                seen.push(watcher);
            }
        }
        seen
    }

    pub fn is_watched(&self) -> bool {
        !self.watchers.is_empty()
    }

    pub(super) fn is_watched_by(&self, watcher: &WatcherId) -> bool {
        self.watchers.iter().any(|(w, _)| w == watcher)
    }
}

impl fmt::Debug for DatastoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreEntry")
            .field("id", &self.id)
            .field("entry_type", &self.entry_type)
            .field("server_id", &self.server_id)
            .field("display_path", &self.display_path)
            .field("datatype", &self.datatype)
            .field("value", &self.value)
            .field("watchers", &self.watchers.len())
            .finish()
    }
}
