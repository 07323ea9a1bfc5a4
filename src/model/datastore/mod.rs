//! Registry of watchable entries
//!
//! The datastore owns every [`DatastoreEntry`] and indexes it two ways: by
//! display path (through a [`PathTree`]) and by backend server id. Both
//! indexes hold the same [`EntryId`], so they always reach the same entry.
//!
//! Watch subscriptions are reference counted per entry. The first watcher of
//! an entry produces [`DatastoreEvent::StartWatching`] and the last one
//! leaving produces [`DatastoreEvent::StopWatching`]; those two events are
//! the only signal the transport needs to (un)subscribe with the backend.

mod entry;

pub use entry::{
    DataType, DatastoreEntry, EntryDefinition, EntryId, EntryType, EnumDefinition, WatchCallback,
    WatchUpdate, WatcherId,
};

use crate::model::path_tree::{normalize_path, PathTree, PathTreeError, SubtreeInfo};
use crate::services::events::{EventEmitter, SubscriptionId};
use crate::services::logging::LogContext;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Datastore failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    /// No entry for this path, id or server id
    NotFound(String),
    /// A second entry was added with an existing server id
    DuplicateServerId(String),
    /// The display path could not be stored
    Tree(PathTreeError),
}

impl fmt::Display for DatastoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatastoreError::NotFound(what) => write!(f, "entry not found: {what}"),
            DatastoreError::DuplicateServerId(id) => write!(f, "duplicate server id: {id}"),
            DatastoreError::Tree(e) => write!(f, "invalid display path: {e}"),
        }
    }
}

impl std::error::Error for DatastoreError {}

impl From<PathTreeError> for DatastoreError {
    fn from(e: PathTreeError) -> Self {
        match e {
            PathTreeError::NotFound(path) => DatastoreError::NotFound(path),
            other => DatastoreError::Tree(other),
        }
    }
}

/// Notifications published by the datastore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatastoreEvent {
    /// The catalogue is complete and usable
    Ready,
    /// Every entry was dropped
    Cleared,
    /// An entry got its first watcher
    StartWatching { entry_id: EntryId, server_id: String },
    /// An entry lost its last watcher
    StopWatching { entry_id: EntryId, server_id: String },
}

/// Reference to an entry, resolved once at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRef<'a> {
    Id(EntryId),
    Path(&'a str),
}

impl From<EntryId> for EntryRef<'_> {
    fn from(id: EntryId) -> Self {
        EntryRef::Id(id)
    }
}

impl<'a> From<&'a str> for EntryRef<'a> {
    fn from(path: &'a str) -> Self {
        EntryRef::Path(path)
    }
}

impl<'a> From<&'a String> for EntryRef<'a> {
    fn from(path: &'a String) -> Self {
        EntryRef::Path(path.as_str())
    }
}

impl<'a> From<&'a DatastoreEntry> for EntryRef<'a> {
    fn from(entry: &'a DatastoreEntry) -> Self {
        EntryRef::Id(entry.id())
    }
}

/// Result of [`Datastore::get_children`]
#[derive(Debug)]
pub struct DatastoreChildren<'a> {
    /// Entries of the requested type directly under the folder
    pub entries: Vec<&'a DatastoreEntry>,
    /// Direct subfolders, annotated independently of entry type
    pub subfolders: Vec<SubtreeInfo>,
}

/// Optional predicate applied by [`Datastore::get_children`]
pub type EntryFilter<'f> = &'f dyn Fn(&DatastoreEntry) -> bool;

pub struct Datastore {
    entries: HashMap<EntryId, DatastoreEntry>,
    tree: PathTree<EntryId>,
    by_type: HashMap<EntryType, Vec<EntryId>>,
    by_server_id: HashMap<String, EntryId>,
    /// Memoized path lookups, dropped wholesale on clear
    path_cache: RefCell<HashMap<String, EntryId>>,
    /// Entries with at least one watcher
    watched: BTreeSet<EntryId>,
    /// Reverse index used by `unwatch_all`
    watched_by: HashMap<WatcherId, HashSet<EntryId>>,
    ready: bool,
    next_id: u64,
    events: EventEmitter<DatastoreEvent>,
    log: LogContext,
}

impl Datastore {
    pub fn new(log: &LogContext) -> Self {
        Self {
            entries: HashMap::new(),
            tree: PathTree::new(),
            by_type: HashMap::new(),
            by_server_id: HashMap::new(),
            path_cache: RefCell::new(HashMap::new()),
            watched: BTreeSet::new(),
            watched_by: HashMap::new(),
            ready: false,
            next_id: 0,
            events: EventEmitter::new(),
            log: log.child("datastore"),
        }
    }

    /// Listen to datastore notifications
    pub fn subscribe(&mut self, listener: impl FnMut(&DatastoreEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Number of entries of every type
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logging context shared by code feeding this datastore
    pub fn log(&self) -> &LogContext {
        &self.log
    }

    /// Insert a new entry.
    ///
    /// Server ids are unique across every entry type. A display path that
    /// is already in use is overwritten in the path index (the earlier entry
    /// stays reachable through its server id).
    pub fn add(
        &mut self,
        entry_type: EntryType,
        definition: EntryDefinition,
    ) -> Result<EntryId, DatastoreError> {
        if self.by_server_id.contains_key(&definition.id) {
            return Err(DatastoreError::DuplicateServerId(definition.id));
        }

        let id = EntryId(self.next_id);
        let previous = self.tree.add(&definition.display_path, id)?;
        self.next_id += 1;

        if let Some(previous) = previous {
            tracing::warn!(
                parent: self.log.span(),
                "display path {} already used by {}, replacing it in the path index",
                definition.display_path,
                previous
            );
            self.path_cache
                .borrow_mut()
                .remove(&normalize_path(&definition.display_path));
        }

        self.by_server_id.insert(definition.id.clone(), id);
        self.by_type.entry(entry_type).or_default().push(id);

        tracing::trace!(
            parent: self.log.span(),
            "added {} {} ({})",
            entry_type,
            definition.display_path,
            definition.id
        );
        self.entries
            .insert(id, DatastoreEntry::new(id, entry_type, definition));
        Ok(id)
    }

    fn resolve(&self, entry: EntryRef<'_>) -> Result<EntryId, DatastoreError> {
        match entry {
            EntryRef::Id(id) => {
                if self.entries.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(DatastoreError::NotFound(id.to_string()))
                }
            }
            EntryRef::Path(path) => {
                let key = normalize_path(path);
                if let Some(id) = self.path_cache.borrow().get(&key) {
                    return Ok(*id);
                }
                let id = *self.tree.get(path)?;
                self.path_cache.borrow_mut().insert(key, id);
                Ok(id)
            }
        }
    }

    /// The canonical entry for a path or id
    pub fn get_entry<'a>(&self, entry: impl Into<EntryRef<'a>>) -> Result<&DatastoreEntry, DatastoreError> {
        let id = self.resolve(entry.into())?;
        self.entries
            .get(&id)
            .ok_or_else(|| DatastoreError::NotFound(id.to_string()))
    }

    pub fn get_entry_by_server_id(&self, server_id: &str) -> Result<&DatastoreEntry, DatastoreError> {
        self.by_server_id
            .get(server_id)
            .and_then(|id| self.entries.get(id))
            .ok_or_else(|| DatastoreError::NotFound(server_id.to_string()))
    }

    pub fn get_server_id<'a>(&self, entry: impl Into<EntryRef<'a>>) -> Result<&str, DatastoreError> {
        Ok(self.get_entry(entry)?.server_id())
    }

    pub fn get_display_path<'a>(&self, entry: impl Into<EntryRef<'a>>) -> Result<&str, DatastoreError> {
        Ok(self.get_entry(entry)?.display_path())
    }

    /// Existence check that never fails
    pub fn node_exists(&self, path: &str) -> bool {
        self.get_entry(path).is_ok()
    }

    /// Entries of one type, in insertion order
    pub fn get_entries(&self, entry_type: EntryType) -> Vec<&DatastoreEntry> {
        self.by_type
            .get(&entry_type)
            .map(|ids| ids.iter().filter_map(|id| self.entries.get(id)).collect())
            .unwrap_or_default()
    }

    /// Last known value; `Ok(None)` means the entry exists but its value is unknown
    pub fn get_value<'a>(&self, entry: impl Into<EntryRef<'a>>) -> Result<Option<&Value>, DatastoreError> {
        Ok(self.get_entry(entry)?.value())
    }

    /// Store a new value and run every watch callback on that entry, in
    /// registration order.
    pub fn set_value<'a>(&mut self, entry: impl Into<EntryRef<'a>>, value: Value) -> Result<(), DatastoreError> {
        let id = self.resolve(entry.into())?;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| DatastoreError::NotFound(id.to_string()))?;

        let DatastoreEntry {
            server_id,
            display_path,
            value: slot,
            watchers,
            ..
        } = entry;
        let value = &*slot.insert(value);

        for (watcher, callback) in watchers.iter_mut() {
            callback(&WatchUpdate {
                entry_id: id,
                server_id: server_id.as_str(),
                display_path: display_path.as_str(),
                watcher: &*watcher,
                value,
            });
        }
        Ok(())
    }

    /// Register `callback` for value changes of `entry` on behalf of `watcher`.
    pub fn watch<'a>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
        watcher: impl Into<WatcherId>,
        callback: impl FnMut(&WatchUpdate<'_>) + 'static,
    ) -> Result<(), DatastoreError> {
        let id = self.resolve(entry.into())?;
        let watcher = watcher.into();
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| DatastoreError::NotFound(id.to_string()))?;

        let first_watcher = !entry.is_watched();
        entry.watchers.push((watcher.clone(), Box::new(callback)));
        let server_id = entry.server_id.clone();

        self.watched_by.entry(watcher).or_default().insert(id);
        if first_watcher {
            self.watched.insert(id);
            tracing::debug!(parent: self.log.span(), "start watching {}", server_id);
            self.events
                .emit(&DatastoreEvent::StartWatching { entry_id: id, server_id });
        }
        Ok(())
    }

    /// Drop every callback `watcher` registered on `entry`.
    ///
    /// Unwatching an entry the watcher does not watch is a no-op.
    pub fn unwatch<'a>(
        &mut self,
        entry: impl Into<EntryRef<'a>>,
        watcher: &WatcherId,
    ) -> Result<(), DatastoreError> {
        let id = self.resolve(entry.into())?;
        self.remove_watcher(id, watcher);
        if let Some(ids) = self.watched_by.get_mut(watcher) {
            ids.remove(&id);
            if ids.is_empty() {
                self.watched_by.remove(watcher);
            }
        }
        Ok(())
    }

    /// Drop every callback `watcher` registered on any entry
    pub fn unwatch_all(&mut self, watcher: &WatcherId) {
        let Some(ids) = self.watched_by.remove(watcher) else {
            return;
        };
        let mut ids: Vec<EntryId> = ids.into_iter().collect();
        ids.sort();
        for id in ids {
            self.remove_watcher(id, watcher);
        }
    }

    fn remove_watcher(&mut self, id: EntryId, watcher: &WatcherId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if !entry.is_watched_by(watcher) {
            return;
        }
        entry.watchers.retain(|(w, _)| w != watcher);

        if !entry.is_watched() {
            let server_id = entry.server_id.clone();
            self.watched.remove(&id);
            tracing::debug!(parent: self.log.span(), "stop watching {}", server_id);
            self.events
                .emit(&DatastoreEvent::StopWatching { entry_id: id, server_id });
        }
    }

    /// Entries that currently have at least one watcher
    pub fn get_watched_entries(&self) -> Vec<&DatastoreEntry> {
        self.watched
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn get_watchers<'a>(&self, entry: impl Into<EntryRef<'a>>) -> Result<Vec<&WatcherId>, DatastoreError> {
        Ok(self.get_entry(entry)?.watchers())
    }

    /// Entries of `entry_type` directly under `path`, plus its subfolders.
    ///
    /// Subfolder annotations (`has_objects`, `has_subtrees`) count entries of
    /// every type.
    pub fn get_children(
        &self,
        entry_type: EntryType,
        path: &str,
        filter: Option<EntryFilter<'_>>,
    ) -> Result<DatastoreChildren<'_>, DatastoreError> {
        let listing = self.tree.get_children(path)?;
        let entries = listing
            .objects
            .iter()
            .filter_map(|(_, id)| self.entries.get(*id))
            .filter(|entry| entry.entry_type() == entry_type)
            .filter(|entry| filter.map_or(true, |f| f(entry)))
            .collect();

        Ok(DatastoreChildren {
            entries,
            subfolders: listing.subtrees,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Mark the catalogue complete; notifies only on a not-ready to ready transition
    pub fn set_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        tracing::info!(parent: self.log.span(), "catalogue ready with {} entries", self.entries.len());
        self.events.emit(&DatastoreEvent::Ready);
    }

    /// Drop every entry, index and watch, then notify listeners
    pub fn clear(&mut self) {
        self.clear_silent();
        self.events.emit(&DatastoreEvent::Cleared);
    }

    /// Same as [`Datastore::clear`] without the `Cleared` notification.
    ///
    /// Watched entries still produce `StopWatching` before they go away.
    pub fn clear_silent(&mut self) {
        tracing::debug!(parent: self.log.span(), "clearing {} entries", self.entries.len());
        for id in std::mem::take(&mut self.watched) {
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            let server_id = entry.server_id.clone();
            tracing::debug!(parent: self.log.span(), "stop watching {}", server_id);
            self.events
                .emit(&DatastoreEvent::StopWatching { entry_id: id, server_id });
        }
        self.entries.clear();
        self.tree.clear();
        self.by_type.clear();
        self.by_server_id.clear();
        self.path_cache.borrow_mut().clear();
        self.watched.clear();
        self.watched_by.clear();
        self.ready = false;
    }
}

impl Default for Datastore {
    fn default() -> Self {
        Self::new(&LogContext::default())
    }
}

impl fmt::Debug for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datastore")
            .field("entries", &self.entries.len())
            .field("watched", &self.watched.len())
            .field("ready", &self.ready)
            .finish()
    }
}
