//! Catalogue download and value feed
//!
//! The backend announces how many watchables of each type it is about to
//! send, then streams them in pages. [`CatalogueSync`] fills a datastore
//! from those pages and only marks it ready once every announced entry has
//! arrived. Any inconsistency empties the datastore instead of leaving it
//! half-populated.

use crate::model::datastore::{Datastore, DatastoreError, EntryDefinition, EntryType};
use crate::services::logging::LogContext;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Catalogue ingestion failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueError {
    /// The backend sent more, or fewer, entries of a type than announced
    CountMismatch {
        entry_type: EntryType,
        expected: usize,
        received: usize,
    },
    /// A page or `finish` arrived without a `begin`
    NotStarted,
    Datastore(DatastoreError),
}

impl fmt::Display for CatalogueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogueError::CountMismatch {
                entry_type,
                expected,
                received,
            } => write!(
                f,
                "expected {expected} {entry_type} entries, received {received}"
            ),
            CatalogueError::NotStarted => write!(f, "no catalogue download in progress"),
            CatalogueError::Datastore(e) => write!(f, "datastore error: {e}"),
        }
    }
}

impl std::error::Error for CatalogueError {}

impl From<DatastoreError> for CatalogueError {
    fn from(e: DatastoreError) -> Self {
        CatalogueError::Datastore(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Receiving,
    Done,
    Failed,
}

/// Drives one catalogue download at a time into a datastore
#[derive(Debug)]
pub struct CatalogueSync {
    expected: HashMap<EntryType, usize>,
    received: HashMap<EntryType, usize>,
    state: SyncState,
    log: LogContext,
}

impl CatalogueSync {
    pub fn new(log: &LogContext) -> Self {
        Self {
            expected: HashMap::new(),
            received: HashMap::new(),
            state: SyncState::Idle,
            log: log.child("catalogue"),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Entries of `entry_type` received so far
    pub fn received(&self, entry_type: EntryType) -> usize {
        self.received.get(&entry_type).copied().unwrap_or(0)
    }

    /// Start a download. Types missing from `expected` are expected to be empty.
    pub fn begin(&mut self, datastore: &mut Datastore, expected: HashMap<EntryType, usize>) {
        datastore.clear_silent();
        tracing::info!(
            parent: self.log.span(),
            "catalogue download started, expecting {:?}",
            expected
        );
        self.expected = expected;
        self.received.clear();
        self.state = SyncState::Receiving;
    }

    /// Add one page of definitions of a single type
    pub fn ingest_page(
        &mut self,
        datastore: &mut Datastore,
        entry_type: EntryType,
        definitions: Vec<EntryDefinition>,
    ) -> Result<usize, CatalogueError> {
        if self.state != SyncState::Receiving {
            return Err(CatalogueError::NotStarted);
        }

        let expected = self.expected.get(&entry_type).copied().unwrap_or(0);
        let received = self.received(entry_type) + definitions.len();
        if received > expected {
            return Err(self.fail(
                datastore,
                CatalogueError::CountMismatch {
                    entry_type,
                    expected,
                    received,
                },
            ));
        }

        let count = definitions.len();
        for definition in definitions {
            if let Err(e) = datastore.add(entry_type, definition) {
                return Err(self.fail(datastore, e.into()));
            }
        }
        self.received.insert(entry_type, received);
        tracing::debug!(
            parent: self.log.span(),
            "received {} {} entries ({}/{})",
            count,
            entry_type,
            received,
            expected
        );
        Ok(count)
    }

    /// Verify every type is complete and mark the datastore ready
    pub fn finish(&mut self, datastore: &mut Datastore) -> Result<(), CatalogueError> {
        if self.state != SyncState::Receiving {
            return Err(CatalogueError::NotStarted);
        }

        for entry_type in EntryType::ALL {
            let expected = self.expected.get(&entry_type).copied().unwrap_or(0);
            let received = self.received(entry_type);
            if expected != received {
                return Err(self.fail(
                    datastore,
                    CatalogueError::CountMismatch {
                        entry_type,
                        expected,
                        received,
                    },
                ));
            }
        }

        self.state = SyncState::Done;
        datastore.set_ready();
        Ok(())
    }

    /// Give up on the current download
    pub fn abort(&mut self, datastore: &mut Datastore) {
        tracing::info!(parent: self.log.span(), "catalogue download aborted");
        datastore.clear();
        self.state = SyncState::Idle;
    }

    /// Run a whole download from an in-memory snapshot
    pub fn load(
        &mut self,
        datastore: &mut Datastore,
        snapshot: CatalogueSnapshot,
    ) -> Result<(), CatalogueError> {
        self.begin(datastore, snapshot.counts());
        let CatalogueSnapshot { var, alias, rpv } = snapshot;
        self.ingest_page(datastore, EntryType::Var, var)?;
        self.ingest_page(datastore, EntryType::Alias, alias)?;
        self.ingest_page(datastore, EntryType::Rpv, rpv)?;
        self.finish(datastore)
    }

    fn fail(&mut self, datastore: &mut Datastore, err: CatalogueError) -> CatalogueError {
        tracing::warn!(parent: self.log.span(), "catalogue download failed: {}", err);
        datastore.clear();
        self.state = SyncState::Failed;
        err
    }
}

/// Complete catalogue as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueSnapshot {
    #[serde(default)]
    pub var: Vec<EntryDefinition>,
    #[serde(default)]
    pub alias: Vec<EntryDefinition>,
    #[serde(default)]
    pub rpv: Vec<EntryDefinition>,
}

impl CatalogueSnapshot {
    pub fn counts(&self) -> HashMap<EntryType, usize> {
        HashMap::from([
            (EntryType::Var, self.var.len()),
            (EntryType::Alias, self.alias.len()),
            (EntryType::Rpv, self.rpv.len()),
        ])
    }
}

/// Read a catalogue snapshot from a JSON file
pub fn load_snapshot(path: &Path) -> anyhow::Result<CatalogueSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalogue snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse catalogue snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// One new value pushed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueUpdate {
    /// Server id of the watchable
    pub id: String,
    pub value: Value,
}

/// Apply a batch of value updates. Unknown server ids are skipped.
///
/// Returns how many updates were applied.
pub fn apply_value_updates(datastore: &mut Datastore, updates: &[ValueUpdate]) -> usize {
    let log = datastore.log().child("updates");
    let mut applied = 0;
    for update in updates {
        let Ok(entry_id) = datastore.get_entry_by_server_id(&update.id).map(|e| e.id()) else {
            tracing::warn!(parent: log.span(), "value update for unknown server id {}", update.id);
            continue;
        };
        match datastore.set_value(entry_id, update.value.clone()) {
            Ok(()) => applied += 1,
            Err(e) => tracing::warn!(
                parent: log.span(),
                "could not apply value update for {}: {}",
                update.id,
                e
            ),
        }
    }
    applied
}
