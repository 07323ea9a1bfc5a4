use super::node::{NewRow, NodeId, NodeRef, Row, RowHandle};
use super::transfer::{TransferMode, TransferPolicy, TransferRequest};
use super::TreeTableError;
use crate::config::TableOptions;
use crate::services::logging::LogContext;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

/// Lazy child loader: given a row, returns its direct children
pub type Loader<C> = Box<dyn FnMut(&NodeId, &C) -> Result<Vec<NewRow<C>>, TreeTableError>>;

/// Flat, pre-ordered tree of rows with lazy loading
///
/// Rows live in a single `Vec` where each row is followed by the contiguous
/// block of its descendants. Structural queries scan forward from a row's
/// position until the level drops back; `index` maps ids to positions and is
/// rewritten from the splice point after every insert, delete or move.
pub struct TreeTable<C> {
    pub(super) name: String,
    options: TableOptions,
    pub(super) rows: Vec<Row<C>>,
    pub(super) index: HashMap<NodeId, usize>,
    loader: Option<Loader<C>>,
    pub(super) policy: Option<TransferPolicy>,
    pub(super) log: LogContext,
}

impl<C> TreeTable<C> {
    pub fn new(name: &str, options: TableOptions, log: &LogContext) -> Self {
        Self {
            name: name.to_string(),
            options,
            rows: Vec::new(),
            index: HashMap::new(),
            loader: None,
            policy: None,
            log: log.child(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Install the function that fetches a row's children on first expansion
    pub fn set_loader(
        &mut self,
        loader: impl FnMut(&NodeId, &C) -> Result<Vec<NewRow<C>>, TreeTableError> + 'static,
    ) {
        self.loader = Some(Box::new(loader));
    }

    /// Install the function deciding how rows dropped onto this table are accepted
    pub fn set_transfer_policy(
        &mut self,
        policy: impl Fn(&TransferRequest<'_>) -> TransferMode + 'static,
    ) {
        self.policy = Some(Box::new(policy));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in display order, hidden ones included
    pub fn rows(&self) -> &[Row<C>] {
        &self.rows
    }

    /// Rows currently shown, in display order
    pub fn visible_rows(&self) -> Vec<&Row<C>> {
        self.rows.iter().filter(|r| r.visible).collect()
    }

    pub fn roots(&self) -> Vec<&Row<C>> {
        self.rows.iter().filter(|r| r.is_root()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub(super) fn position(&self, id: &NodeId) -> Result<usize, TreeTableError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| TreeTableError::NodeNotFound(id.clone()))
    }

    pub(super) fn resolve(&self, node: &NodeRef) -> Result<usize, TreeTableError> {
        match node {
            NodeRef::Id(id) => self.position(id),
            NodeRef::Handle(handle) => match self.rows.get(handle.position) {
                Some(row) if row.id == handle.id => Ok(handle.position),
                _ => self.position(&handle.id),
            },
        }
    }

    /// Handle carrying the row's current position
    pub fn row_handle(&self, node: impl Into<NodeRef>) -> Result<RowHandle, TreeTableError> {
        let position = self.resolve(&node.into())?;
        Ok(RowHandle {
            id: self.rows[position].id.clone(),
            position,
        })
    }

    pub fn get_row(&self, node: impl Into<NodeRef>) -> Result<&Row<C>, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        Ok(&self.rows[pos])
    }

    pub fn content_mut(&mut self, node: impl Into<NodeRef>) -> Result<&mut C, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        Ok(&mut self.rows[pos].content)
    }

    /// One past the last row of the block starting at `pos`
    pub(super) fn block_end(&self, pos: usize) -> usize {
        let level = self.rows[pos].level;
        self.rows[pos + 1..]
            .iter()
            .position(|r| r.level <= level)
            .map_or(self.rows.len(), |offset| pos + 1 + offset)
    }

    pub(super) fn reindex_from(&mut self, start: usize) {
        for (offset, row) in self.rows[start..].iter().enumerate() {
            self.index.insert(row.id.clone(), start + offset);
        }
    }

    /// Recompute visibility for `range`; parents must precede children
    pub(super) fn refresh_visibility(&mut self, range: Range<usize>) {
        for i in range {
            let visible = match &self.rows[i].parent {
                None => true,
                Some(parent) => self
                    .index
                    .get(parent)
                    .is_some_and(|&p| self.rows[p].visible && self.rows[p].expanded),
            };
            self.rows[i].visible = visible;
        }
    }

    /// Reject empty ids and ids already used in this table or in the batch
    pub(super) fn check_new_ids<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a NodeId>,
    ) -> Result<(), TreeTableError> {
        let mut seen = HashSet::new();
        for id in ids {
            if id.0.is_empty() {
                return Err(TreeTableError::MissingField("id"));
            }
            if self.index.contains_key(id) || !seen.insert(id) {
                return Err(TreeTableError::DuplicateNodeId(id.clone()));
            }
        }
        Ok(())
    }

    pub(super) fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Append `new_rows` as the last children of the row at `parent_pos`
    fn insert_children(
        &mut self,
        parent_pos: usize,
        new_rows: Vec<NewRow<C>>,
    ) -> Result<(), TreeTableError> {
        self.check_new_ids(new_rows.iter().map(|r| &r.id))?;

        let parent_id = self.rows[parent_pos].id.clone();
        let level = self.rows[parent_pos].level + 1;
        let at = self.block_end(parent_pos);
        let count = new_rows.len();

        let rows: Vec<Row<C>> = new_rows
            .into_iter()
            .map(|new| Row::from_new(new, Some(parent_id.clone()), level))
            .collect();
        self.rows.splice(at..at, rows);
        self.reindex_from(at);

        let parent = &mut self.rows[parent_pos];
        parent.children_count += count;
        parent.children_loaded = true;

        self.refresh_visibility(at..at + count);
        Ok(())
    }

    /// Run the loader for an unloaded row. Never calls it twice for a row.
    pub(super) fn ensure_loaded(&mut self, pos: usize) -> Result<(), TreeTableError> {
        if self.rows[pos].children_loaded {
            return Ok(());
        }

        let mut loader = self
            .loader
            .take()
            .ok_or(TreeTableError::MissingCallback("loader"))?;
        let result = loader(&self.rows[pos].id, &self.rows[pos].content);
        self.loader = Some(loader);
        let children = result?;

        tracing::debug!(
            parent: self.log.span(),
            "loaded {} children for {}",
            children.len(),
            self.rows[pos].id
        );
        self.insert_children(pos, children)
    }

    /// Append a root row whose children are fetched lazily.
    ///
    /// When a loader is installed the children are fetched right away, so the
    /// row knows whether it is expandable, but the row stays collapsed.
    pub fn add_root_node(
        &mut self,
        id: impl Into<NodeId>,
        content: C,
    ) -> Result<RowHandle, TreeTableError> {
        self.add_root_row(NewRow::new(id, content))
    }

    /// Append a root row. If its children fail to load the row is not added.
    pub fn add_root_row(&mut self, new: NewRow<C>) -> Result<RowHandle, TreeTableError> {
        self.check_new_ids(std::iter::once(&new.id))?;

        let position = self.rows.len();
        let mut row = Row::from_new(new, None, 0);
        row.visible = true;
        let id = row.id.clone();
        self.index.insert(id.clone(), position);
        self.rows.push(row);

        if self.has_loader() {
            if let Err(e) = self.ensure_loaded(position) {
                self.rows.truncate(position);
                self.index.remove(&id);
                return Err(e);
            }
        }
        Ok(RowHandle { id, position })
    }

    /// Insert a caller-provided child as the last child of `parent`.
    ///
    /// The parent counts as loaded afterwards; the loader will not run for it.
    pub fn add_child_node(
        &mut self,
        parent: impl Into<NodeRef>,
        new: NewRow<C>,
    ) -> Result<RowHandle, TreeTableError> {
        let parent_pos = self.resolve(&parent.into())?;
        let id = new.id.clone();
        self.insert_children(parent_pos, vec![new])?;
        let position = self.position(&id)?;
        Ok(RowHandle { id, position })
    }

    /// Direct children, in display order
    pub fn get_children(&self, node: impl Into<NodeRef>) -> Result<Vec<&Row<C>>, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        let level = self.rows[pos].level;
        let end = self.block_end(pos);
        Ok(self.rows[pos + 1..end]
            .iter()
            .filter(|r| r.level == level + 1)
            .collect())
    }

    /// Every row of the block below `node`, in display order
    pub fn get_descendants(&self, node: impl Into<NodeRef>) -> Result<Vec<&Row<C>>, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        let end = self.block_end(pos);
        Ok(self.rows[pos + 1..end].iter().collect())
    }

    /// Parent row; `Ok(None)` for a root
    pub fn get_parent(&self, node: impl Into<NodeRef>) -> Result<Option<&Row<C>>, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        match &self.rows[pos].parent {
            None => Ok(None),
            Some(parent) => Ok(Some(&self.rows[self.position(parent)?])),
        }
    }

    /// Open a row, loading its children if they were never fetched.
    ///
    /// Descendants that were expanded before an ancestor was collapsed are
    /// shown again with their own subtrees. Does nothing for hidden or
    /// already expanded rows.
    pub fn expand(&mut self, node: impl Into<NodeRef>) -> Result<(), TreeTableError> {
        let pos = self.resolve(&node.into())?;
        let row = &self.rows[pos];
        if !row.visible || row.expanded {
            return Ok(());
        }

        self.ensure_loaded(pos)?;
        if self.rows[pos].children_count == 0 {
            return Ok(());
        }

        self.rows[pos].expanded = true;
        let end = self.block_end(pos);
        self.refresh_visibility(pos + 1..end);
        Ok(())
    }

    /// Hide every descendant. Their own expanded flags are kept.
    pub fn collapse(&mut self, node: impl Into<NodeRef>) -> Result<(), TreeTableError> {
        let pos = self.resolve(&node.into())?;
        self.rows[pos].expanded = false;
        let end = self.block_end(pos);
        self.refresh_visibility(pos + 1..end);
        Ok(())
    }

    pub fn toggle(&mut self, node: impl Into<NodeRef>) -> Result<(), TreeTableError> {
        let node = node.into();
        let pos = self.resolve(&node)?;
        if self.rows[pos].expanded {
            self.collapse(node)
        } else {
            self.expand(node)
        }
    }

    fn target_ids(&self, node: Option<NodeRef>) -> Result<Vec<NodeId>, TreeTableError> {
        match node {
            Some(node) => {
                let pos = self.resolve(&node)?;
                Ok(vec![self.rows[pos].id.clone()])
            }
            None => Ok(self.roots().iter().map(|r| r.id.clone()).collect()),
        }
    }

    /// Expand `node` (or every root) and, recursively, all of its descendants
    pub fn expand_all(&mut self, node: Option<NodeRef>) -> Result<(), TreeTableError> {
        for id in self.target_ids(node)? {
            self.expand_subtree(&id)?;
        }
        Ok(())
    }

    fn expand_subtree(&mut self, id: &NodeId) -> Result<(), TreeTableError> {
        self.expand(id)?;
        let children: Vec<NodeId> = self
            .get_children(id)?
            .iter()
            .map(|r| r.id.clone())
            .collect();
        for child in &children {
            self.expand_subtree(child)?;
        }
        Ok(())
    }

    /// Collapse `node` (or every root) and all of its descendants, leaves first
    pub fn collapse_all(&mut self, node: Option<NodeRef>) -> Result<(), TreeTableError> {
        for id in self.target_ids(node)? {
            self.collapse_subtree(&id)?;
        }
        Ok(())
    }

    fn collapse_subtree(&mut self, id: &NodeId) -> Result<(), TreeTableError> {
        let children: Vec<NodeId> = self
            .get_children(id)?
            .iter()
            .map(|r| r.id.clone())
            .collect();
        for child in &children {
            self.collapse_subtree(child)?;
        }
        self.collapse(id)
    }

    fn decrement_children(&mut self, parent: &NodeId) -> Result<(), TreeTableError> {
        let pos = self.position(parent)?;
        let row = &mut self.rows[pos];
        row.children_count = row
            .children_count
            .checked_sub(1)
            .ok_or_else(|| TreeTableError::NegativeChildCount(parent.clone()))?;
        if row.children_count == 0 {
            row.expanded = false;
        }
        Ok(())
    }

    /// Remove the block starting at `pos` and fix up the parent's count
    pub(super) fn take_block(&mut self, pos: usize) -> Result<Vec<Row<C>>, TreeTableError> {
        if let Some(parent) = &self.rows[pos].parent {
            let parent_pos = self.position(parent)?;
            if self.rows[parent_pos].children_count == 0 {
                return Err(TreeTableError::NegativeChildCount(parent.clone()));
            }
        }

        let end = self.block_end(pos);
        let removed: Vec<Row<C>> = self.rows.drain(pos..end).collect();
        for row in &removed {
            self.index.remove(&row.id);
        }
        self.reindex_from(pos);

        if let Some(parent) = &removed[0].parent {
            self.decrement_children(parent)?;
        }
        Ok(removed)
    }

    /// Delete a row with all its descendants. Returns how many rows were removed.
    pub fn delete(&mut self, node: impl Into<NodeRef>) -> Result<usize, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        let removed = self.take_block(pos)?;
        tracing::debug!(
            parent: self.log.span(),
            "deleted {} ({} rows)",
            removed[0].id,
            removed.len()
        );
        Ok(removed.len())
    }

    /// Drop every row
    pub fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }
}

impl<C> fmt::Debug for TreeTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeTable")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("loader", &self.loader.is_some())
            .field("policy", &self.policy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::tree_table::RowState;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Loader serving a fixed hierarchy: `children[id]` lists child ids,
    /// ids missing from the map are leaves
    fn fixed_loader(
        children: &[(&str, &[&str])],
        calls: Rc<RefCell<Vec<String>>>,
    ) -> impl FnMut(&NodeId, &String) -> Result<Vec<NewRow<String>>, TreeTableError> + 'static
    {
        let map: HashMap<String, Vec<String>> = children
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect();
        move |id, _content| {
            calls.borrow_mut().push(id.to_string());
            Ok(map
                .get(id.as_str())
                .map(|kids| {
                    kids.iter()
                        .map(|k| NewRow::new(k.as_str(), format!("row {k}")))
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn sample_table() -> (TreeTable<String>, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut table = TreeTable::new("vars", TableOptions::default(), &LogContext::default());
        table.set_loader(fixed_loader(
            &[
                ("root", &["a", "b"]),
                ("a", &["a1", "a2"]),
                ("a1", &["a1x"]),
            ],
            calls.clone(),
        ));
        table.add_root_node("root", "Root".to_string()).unwrap();
        (table, calls)
    }

    fn ids<C>(rows: &[&Row<C>]) -> Vec<String> {
        rows.iter().map(|r| r.id().to_string()).collect()
    }

    fn visible_ids<C>(table: &TreeTable<C>) -> Vec<String> {
        ids(&table.visible_rows())
    }

    /// Contiguous-block and child-count invariants
    fn assert_consistent<C>(table: &TreeTable<C>) {
        for (pos, row) in table.rows().iter().enumerate() {
            assert_eq!(table.index.get(row.id()), Some(&pos));
            let direct = table.get_children(row.id()).unwrap().len();
            assert_eq!(direct, row.children_count(), "count of {}", row.id());
            if let Some(parent) = row.parent() {
                let ppos = table.position(parent).unwrap();
                assert!(ppos < pos);
                assert_eq!(table.rows[ppos].level + 1, row.level());
                assert!(table.block_end(ppos) > pos);
            } else {
                assert_eq!(row.level(), 0);
            }
        }
        assert_eq!(table.index.len(), table.len());
    }

    #[test]
    fn test_add_root_loads_but_does_not_expand() {
        let (table, calls) = sample_table();

        assert_eq!(*calls.borrow(), vec!["root"]);
        let root = table.get_row("root").unwrap();
        assert!(root.children_loaded());
        assert_eq!(root.children_count(), 2);
        assert_eq!(root.state(), RowState::Collapsed);
        assert!(root.has_expander());
        assert_eq!(visible_ids(&table), vec!["root"]);
        assert_consistent(&table);
    }

    #[test]
    fn test_expand_loads_once() {
        let (mut table, calls) = sample_table();

        table.expand("root").unwrap();
        assert_eq!(visible_ids(&table), vec!["root", "a", "b"]);

        table.expand("a").unwrap();
        let a_children = table.get_children("a").unwrap();
        assert_eq!(ids(&a_children), vec!["a1", "a2"]);
        assert!(a_children.iter().all(|r| r.parent() == Some(&NodeId::from("a"))));
        assert_eq!(table.get_row("a").unwrap().children_count(), 2);

        table.collapse("a").unwrap();
        table.expand("a").unwrap();
        assert_eq!(*calls.borrow(), vec!["root", "a"]);
        assert_consistent(&table);
    }

    #[test]
    fn test_collapse_preserves_descendant_expansion() {
        let (mut table, _) = sample_table();
        table.expand("root").unwrap();
        table.expand("a").unwrap();
        table.expand("a1").unwrap();
        assert_eq!(
            visible_ids(&table),
            vec!["root", "a", "a1", "a1x", "a2", "b"]
        );

        table.collapse("root").unwrap();
        assert_eq!(visible_ids(&table), vec!["root"]);
        assert!(table.get_row("a").unwrap().is_expanded());

        table.expand("root").unwrap();
        assert_eq!(
            visible_ids(&table),
            vec!["root", "a", "a1", "a1x", "a2", "b"]
        );
    }

    #[test]
    fn test_expand_hidden_row_is_noop() {
        let (mut table, calls) = sample_table();
        table.expand("a").unwrap();
        assert!(!table.get_row("a").unwrap().children_loaded());
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_zero_children_removes_expander() {
        let (mut table, _) = sample_table();
        table.expand("root").unwrap();
        assert!(table.get_row("b").unwrap().has_expander());

        table.expand("b").unwrap();
        let b = table.get_row("b").unwrap();
        assert!(b.children_loaded());
        assert_eq!(b.children_count(), 0);
        assert!(!b.has_expander());
        assert!(!b.is_expanded());
    }

    #[test]
    fn test_expand_without_loader() {
        let mut table: TreeTable<()> =
            TreeTable::new("plain", TableOptions::default(), &LogContext::default());
        table.add_root_node("r", ()).unwrap();
        assert_eq!(
            table.expand("r"),
            Err(TreeTableError::MissingCallback("loader"))
        );

        table.add_root_row(NewRow::leaf("leaf", ())).unwrap();
        assert_eq!(table.expand("leaf"), Ok(()));
    }

    #[test]
    fn test_eager_children() {
        let mut table: TreeTable<u32> =
            TreeTable::new("watch", TableOptions::default(), &LogContext::default());
        table.add_root_node("r", 0).unwrap();
        table.add_child_node("r", NewRow::leaf("c1", 1)).unwrap();
        let handle = table.add_child_node("r", NewRow::leaf("c2", 2)).unwrap();

        assert_eq!(handle.id().as_str(), "c2");
        assert_eq!(table.get_row(&handle).unwrap().content(), &2);
        assert_eq!(table.get_row("r").unwrap().children_count(), 2);
        table.expand("r").unwrap();
        assert_eq!(visible_ids(&table), vec!["r", "c1", "c2"]);
        assert_consistent(&table);
    }

    #[test]
    fn test_new_children_append_after_existing_subtree() {
        let (mut table, _) = sample_table();
        table.expand("root").unwrap();
        table.expand("a").unwrap();
        table
            .add_child_node("root", NewRow::leaf("c", "C".to_string()))
            .unwrap();

        let order: Vec<_> = table.rows().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(order, vec!["root", "a", "a1", "a2", "b", "c"]);
        assert_consistent(&table);
    }

    #[test]
    fn test_duplicate_and_empty_ids() {
        let (mut table, _) = sample_table();
        assert_eq!(
            table.add_root_node("a", String::new()),
            Err(TreeTableError::DuplicateNodeId(NodeId::from("a")))
        );
        assert_eq!(
            table.add_root_node("", String::new()),
            Err(TreeTableError::MissingField("id"))
        );
    }

    #[test]
    fn test_parent_queries() {
        let (mut table, _) = sample_table();
        table.expand_all(None).unwrap();

        assert!(table.get_parent("root").unwrap().is_none());
        assert_eq!(table.get_parent("a1x").unwrap().unwrap().id().as_str(), "a1");
        assert_eq!(
            ids(&table.get_descendants("a").unwrap()),
            vec!["a1", "a1x", "a2"]
        );
        assert_eq!(
            table.get_parent("zzz").unwrap_err(),
            TreeTableError::NodeNotFound(NodeId::from("zzz"))
        );
    }

    #[test]
    fn test_delete_subtree() {
        let (mut table, _) = sample_table();
        table.expand_all(None).unwrap();

        let removed = table.delete("a").unwrap();
        assert_eq!(removed, 4);
        assert_eq!(table.get_row("root").unwrap().children_count(), 1);
        for id in ["a", "a1", "a1x", "a2"] {
            assert_eq!(
                table.get_row(id).unwrap_err(),
                TreeTableError::NodeNotFound(NodeId::from(id))
            );
        }
        assert_eq!(visible_ids(&table), vec!["root", "b"]);
        assert_consistent(&table);

        table.delete("b").unwrap();
        let root = table.get_row("root").unwrap();
        assert_eq!(root.children_count(), 0);
        assert!(!root.has_expander());
        assert!(table.delete("b").is_err());
    }

    #[test]
    fn test_expand_all_and_collapse_all() {
        let (mut table, calls) = sample_table();
        table.expand_all(None).unwrap();
        assert_eq!(table.visible_rows().len(), 6);
        // every row with children was asked once
        assert_eq!(calls.borrow().len(), 6);

        table.collapse_all(None).unwrap();
        assert_eq!(visible_ids(&table), vec!["root"]);
        assert!(table.rows().iter().all(|r| !r.is_expanded()));

        table.expand("root").unwrap();
        assert_eq!(visible_ids(&table), vec!["root", "a", "b"]);
        assert_consistent(&table);
    }

    #[test]
    fn test_toggle() {
        let (mut table, _) = sample_table();
        table.toggle("root").unwrap();
        assert!(table.get_row("root").unwrap().is_expanded());
        table.toggle("root").unwrap();
        assert!(!table.get_row("root").unwrap().is_expanded());
    }

    #[test]
    fn test_stale_handle_falls_back_to_id() {
        let (mut table, _) = sample_table();
        table.expand("root").unwrap();
        let handle = table.row_handle("b").unwrap();
        table.expand("a").unwrap();

        // b moved down by two rows
        assert_ne!(table.row_handle("b").unwrap(), handle);
        assert_eq!(table.get_row(&handle).unwrap().id().as_str(), "b");
    }

    #[test]
    fn test_loader_error_leaves_row_unloaded() {
        let mut table: TreeTable<()> =
            TreeTable::new("t", TableOptions::default(), &LogContext::default());
        table.add_root_row(NewRow::leaf("r", ())).unwrap();
        table.add_child_node("r", NewRow::new("c", ())).unwrap();
        table.set_loader(|_, _| Ok(vec![NewRow::new("r", ())]));
        table.expand("r").unwrap();

        assert_eq!(
            table.expand("c"),
            Err(TreeTableError::DuplicateNodeId(NodeId::from("r")))
        );
        assert!(!table.get_row("c").unwrap().children_loaded());
    }

    #[test]
    fn test_failed_root_load_can_be_retried() {
        let mut table: TreeTable<()> =
            TreeTable::new("t", TableOptions::default(), &LogContext::default());
        let fail = Rc::new(RefCell::new(true));
        let flag = fail.clone();
        table.set_loader(move |_, _| {
            if *flag.borrow() {
                Err(TreeTableError::MissingField("content"))
            } else {
                Ok(vec![NewRow::leaf("r.0", ())])
            }
        });

        assert_eq!(
            table.add_root_node("r", ()),
            Err(TreeTableError::MissingField("content"))
        );
        assert!(!table.contains("r"));
        assert!(table.is_empty());

        *fail.borrow_mut() = false;
        table.add_root_node("r", ()).unwrap();
        assert_eq!(table.get_row("r").unwrap().children_count(), 1);
        assert_consistent(&table);
    }
}
