// Dragging rows from a browse table into a watch table

mod common;

use common::fixtures::{browse_table, datastore_with, visible_ids, WatchableRow};
use common::tracing::init_tracing_from_env;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use watchbench::config::TableOptions;
use watchbench::model::datastore::{Datastore, EntryType, WatcherId};
use watchbench::services::logging::LogContext;
use watchbench::view::tree_table::{
    DropTarget, NewRow, Row, TransferMode, TransferOutcome, TreeTable,
};

/// Row of the watch table: the entry it displays and its last value
#[derive(Debug, Clone)]
struct WatchedRow {
    path: String,
    value: Rc<RefCell<Option<Value>>>,
}

fn setup() -> (
    Rc<RefCell<Datastore>>,
    TreeTable<WatchableRow>,
    TreeTable<WatchedRow>,
) {
    let ds = Rc::new(RefCell::new(datastore_with(&[
        (EntryType::Var, "v1", "/motor/speed"),
        (EntryType::Var, "v2", "/motor/current"),
        (EntryType::Var, "v3", "/motor/pid/kp"),
    ])));
    let mut varlist = browse_table("varlist", ds.clone(), EntryType::Var, "/");
    varlist.expand_all(None).unwrap();

    let mut watch = TreeTable::new("watch", TableOptions::default(), &LogContext::root("test"));
    watch.set_transfer_policy(|req| {
        if req.same_table {
            TransferMode::WholeSubtree
        } else {
            TransferMode::RowOnly
        }
    });
    (ds, varlist, watch)
}

/// Transform that subscribes the new watch row to the dragged entry
fn watch_transform(
    ds: Rc<RefCell<Datastore>>,
    calls: Rc<Cell<usize>>,
) -> impl FnMut(&Row<WatchableRow>) -> NewRow<WatchedRow> {
    move |row| {
        calls.set(calls.get() + 1);
        let value = Rc::new(RefCell::new(None));
        let path = match row.content() {
            WatchableRow::Entry { path, .. } | WatchableRow::Folder { path } => path.clone(),
        };
        let row_id = format!("watch:{path}");

        if let WatchableRow::Entry { id, .. } = row.content() {
            let sink = value.clone();
            ds.borrow_mut()
                .watch(*id, row_id.as_str(), move |update| {
                    *sink.borrow_mut() = Some(update.value.clone());
                })
                .unwrap();
        }
        NewRow::leaf(row_id, WatchedRow { path, value })
    }
}

#[test]
fn test_row_only_drag_between_tables() {
    init_tracing_from_env();
    let (ds, mut varlist, mut watch) = setup();
    let calls = Rc::new(Cell::new(0));
    let rows_before = varlist.len();

    let outcome = varlist
        .transfer_to(
            &mut watch,
            "/motor",
            DropTarget::root(),
            watch_transform(ds.clone(), calls.clone()),
        )
        .unwrap();

    assert!(matches!(outcome, TransferOutcome::Transferred { rows: 1, .. }));
    assert_eq!(calls.get(), 1);
    assert_eq!(watch.len(), 1);
    assert_eq!(watch.rows()[0].id().as_str(), "watch:/motor");
    assert_eq!(watch.rows()[0].content().path, "/motor");
    assert!(watch.get_descendants("watch:/motor").unwrap().is_empty());

    // /motor, /motor/pid, /motor/pid/kp, /motor/current and /motor/speed are gone
    assert!(!varlist.contains("/motor"));
    assert!(!varlist.contains("/motor/pid/kp"));
    assert_eq!(varlist.len(), rows_before - 5);
    assert_eq!(varlist.get_row("/").unwrap().children_count(), 0);
}

#[test]
fn test_dragged_entry_receives_values() {
    init_tracing_from_env();
    let (ds, mut varlist, mut watch) = setup();
    let calls = Rc::new(Cell::new(0));

    varlist
        .copy_to(
            &mut watch,
            "/motor/speed",
            DropTarget::root(),
            watch_transform(ds.clone(), calls.clone()),
        )
        .unwrap();
    varlist
        .copy_to(
            &mut watch,
            "/motor/current",
            DropTarget::root().after("watch:/motor/speed"),
            watch_transform(ds.clone(), calls.clone()),
        )
        .unwrap();
    assert_eq!(
        visible_ids(&watch),
        vec!["watch:/motor/speed", "watch:/motor/current"]
    );
    assert!(varlist.contains("/motor/speed"));

    ds.borrow_mut().set_value("/motor/speed", json!(1500)).unwrap();
    let speed = watch.get_row("watch:/motor/speed").unwrap();
    assert_eq!(*speed.content().value.borrow(), Some(json!(1500)));
    let current = watch.get_row("watch:/motor/current").unwrap();
    assert_eq!(*current.content().value.borrow(), None);

    // deleting the watch row releases its subscription
    watch.delete("watch:/motor/speed").unwrap();
    ds.borrow_mut()
        .unwatch_all(&WatcherId::from("watch:/motor/speed"));
    assert_eq!(ds.borrow().get_watched_entries().len(), 1);
}

#[test]
fn test_reorder_inside_watch_table() {
    init_tracing_from_env();
    let (ds, mut varlist, mut watch) = setup();
    let calls = Rc::new(Cell::new(0));
    for path in ["/motor/speed", "/motor/current", "/motor/pid/kp"] {
        let after = watch.rows().last().map(|r| r.id().clone());
        let target = match after {
            Some(id) => DropTarget::root().after(id),
            None => DropTarget::root(),
        };
        varlist
            .copy_to(&mut watch, path, target, watch_transform(ds.clone(), calls.clone()))
            .unwrap();
    }

    watch
        .move_node("watch:/motor/pid/kp", DropTarget::root())
        .unwrap();
    assert_eq!(
        visible_ids(&watch),
        vec![
            "watch:/motor/pid/kp",
            "watch:/motor/speed",
            "watch:/motor/current"
        ]
    );
    assert_eq!(calls.get(), 3);
}
