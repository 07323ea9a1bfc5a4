use std::cell::RefCell;
use std::rc::Rc;
use watchbench::config::TableOptions;
use watchbench::model::datastore::{DataType, Datastore, EntryDefinition, EntryId, EntryType};
use watchbench::services::logging::LogContext;
use watchbench::view::tree_table::{NewRow, NodeId, TreeTable, TreeTableError};

/// Content of a row listing datastore folders and entries
#[derive(Debug, Clone, PartialEq)]
pub enum WatchableRow {
    Folder { path: String },
    Entry { id: EntryId, path: String },
}

pub fn def(id: &str, path: &str) -> EntryDefinition {
    EntryDefinition::new(id, path, DataType::Float32)
}

/// Datastore filled with `(type, server id, display path)` triples
pub fn datastore_with(entries: &[(EntryType, &str, &str)]) -> Datastore {
    let mut ds = Datastore::new(&LogContext::root("test"));
    for (entry_type, id, path) in entries {
        ds.add(*entry_type, def(id, path)).unwrap();
    }
    ds
}

/// Loader listing the subfolders and `entry_type` entries of a folder row.
/// Row ids are display paths.
pub fn folder_loader(
    ds: Rc<RefCell<Datastore>>,
    entry_type: EntryType,
) -> impl FnMut(&NodeId, &WatchableRow) -> Result<Vec<NewRow<WatchableRow>>, TreeTableError> {
    move |id, content| {
        let WatchableRow::Folder { path } = content else {
            return Ok(Vec::new());
        };
        let ds = ds.borrow();
        let children = ds
            .get_children(entry_type, path, None)
            .map_err(|_| TreeTableError::NodeNotFound(id.clone()))?;

        let mut rows = Vec::new();
        for folder in children.subfolders {
            let path = folder.display_path.clone();
            rows.push(NewRow::new(path.clone(), WatchableRow::Folder { path }));
        }
        for entry in children.entries {
            let path = entry.display_path().to_string();
            rows.push(NewRow::leaf(
                path.clone(),
                WatchableRow::Entry {
                    id: entry.id(),
                    path,
                },
            ));
        }
        Ok(rows)
    }
}

/// Table showing `entry_type` entries of `ds` under a single root folder
pub fn browse_table(
    name: &str,
    ds: Rc<RefCell<Datastore>>,
    entry_type: EntryType,
    root: &str,
) -> TreeTable<WatchableRow> {
    let mut table = TreeTable::new(name, TableOptions::default(), &LogContext::root("test"));
    table.set_loader(folder_loader(ds, entry_type));
    table
        .add_root_node(
            root,
            WatchableRow::Folder {
                path: root.to_string(),
            },
        )
        .unwrap();
    table
}

pub fn visible_ids<C>(table: &TreeTable<C>) -> Vec<String> {
    table
        .visible_rows()
        .iter()
        .map(|r| r.id().to_string())
        .collect()
}
