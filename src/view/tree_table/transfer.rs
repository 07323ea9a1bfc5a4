//! Drag-and-drop of rows
//!
//! A drop is described by a [`DropTarget`]: the new parent (or none for the
//! top level) and the sibling to insert after. Before anything moves, the
//! destination table's policy sees a [`TransferRequest`] and answers with a
//! [`TransferMode`]. Same-table drops re-parent the row's block in place;
//! cross-table drops rebuild the rows through a caller transform.

use super::node::{NewRow, NodeId, NodeRef, Row, RowHandle};
use super::table::TreeTable;
use super::TreeTableError;
use std::collections::HashMap;
use std::ops::Range;

/// How a drop is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Refuse the drop, nothing changes
    Reject,
    /// Take the dragged row alone; its descendants stay behind (or are dropped
    /// on a move) and the new row starts unloaded or as a leaf
    RowOnly,
    /// Take the row with its whole loaded subtree
    WholeSubtree,
}

/// Where a dragged row lands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropTarget {
    /// New parent; `None` drops at the top level
    pub parent: Option<NodeId>,
    /// Sibling to insert after; `None` makes it the first child (or first root)
    pub insert_after: Option<NodeId>,
}

impl DropTarget {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn under(parent: impl Into<NodeId>) -> Self {
        Self {
            parent: Some(parent.into()),
            insert_after: None,
        }
    }

    pub fn after(mut self, sibling: impl Into<NodeId>) -> Self {
        self.insert_after = Some(sibling.into());
        self
    }
}

/// What a transfer policy gets to look at
#[derive(Debug)]
pub struct TransferRequest<'a> {
    pub source_table: &'a str,
    pub dest_table: &'a str,
    pub same_table: bool,
    pub node: &'a NodeId,
    pub level: usize,
    pub children_count: usize,
    pub target: &'a DropTarget,
}

impl TransferRequest<'_> {
    pub fn is_root_drop(&self) -> bool {
        self.target.parent.is_none()
    }
}

pub type TransferPolicy = Box<dyn Fn(&TransferRequest<'_>) -> TransferMode>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Rejected,
    /// The row now lives at `handle`; `rows` counts it with any descendants taken along
    Transferred { handle: RowHandle, rows: usize },
}

impl<C> TreeTable<C> {
    pub(super) fn decide(&self, request: &TransferRequest<'_>) -> TransferMode {
        self.policy
            .as_ref()
            .map_or(TransferMode::WholeSubtree, |policy| policy(request))
    }

    /// Check that `target` names rows of this table in a valid arrangement.
    /// `moving` is the block being dragged when source and destination match.
    pub(super) fn validate_target(
        &self,
        target: &DropTarget,
        moving: Option<Range<usize>>,
    ) -> Result<(), TreeTableError> {
        if let Some(parent) = &target.parent {
            let parent_pos = self.position(parent)?;
            if moving.as_ref().is_some_and(|block| block.contains(&parent_pos)) {
                return Err(TreeTableError::InvalidDropTarget(format!(
                    "{parent} is inside the dragged subtree"
                )));
            }
        }

        if let Some(sibling) = &target.insert_after {
            let sibling_pos = self.position(sibling)?;
            if moving.as_ref().is_some_and(|block| block.contains(&sibling_pos)) {
                return Err(TreeTableError::InvalidDropTarget(format!(
                    "cannot insert after {sibling}, it is being moved"
                )));
            }
            if self.rows[sibling_pos].parent != target.parent {
                return Err(TreeTableError::InvalidDropTarget(format!(
                    "{sibling} is not a child of the drop parent"
                )));
            }
        }
        Ok(())
    }

    /// Fetch the drop parent's children first so the dropped row lands among them
    fn prepare_target(&mut self, target: &DropTarget) -> Result<(), TreeTableError> {
        if let Some(parent) = &target.parent {
            if self.has_loader() {
                let pos = self.position(parent)?;
                self.ensure_loaded(pos)?;
            }
        }
        Ok(())
    }

    /// Insert position and level for a row dropped at `target`
    fn insertion_point(&self, target: &DropTarget) -> Result<(usize, usize), TreeTableError> {
        let level = match &target.parent {
            Some(parent) => self.rows[self.position(parent)?].level + 1,
            None => 0,
        };
        let at = match (&target.insert_after, &target.parent) {
            (Some(sibling), _) => self.block_end(self.position(sibling)?),
            (None, Some(parent)) => self.position(parent)? + 1,
            (None, None) => 0,
        };
        Ok((at, level))
    }

    /// Splice a detached block at `target`, rebasing its levels
    fn place_block(
        &mut self,
        target: &DropTarget,
        mut block: Vec<Row<C>>,
    ) -> Result<RowHandle, TreeTableError> {
        let (at, level) = self.insertion_point(target)?;
        let base = block[0].level;
        for row in &mut block {
            row.level = row.level - base + level;
        }
        block[0].parent = target.parent.clone();

        let id = block[0].id.clone();
        let count = block.len();
        self.rows.splice(at..at, block);
        self.reindex_from(at);

        if let Some(parent) = &target.parent {
            let parent_pos = self.position(parent)?;
            let parent = &mut self.rows[parent_pos];
            parent.children_count += 1;
            parent.children_loaded = true;
        }

        self.refresh_visibility(at..at + count);
        Ok(RowHandle { id, position: at })
    }

    /// Drag a row to another place in this table
    pub fn move_node(
        &mut self,
        node: impl Into<NodeRef>,
        target: DropTarget,
    ) -> Result<TransferOutcome, TreeTableError> {
        let pos = self.resolve(&node.into())?;
        let end = self.block_end(pos);
        self.validate_target(&target, Some(pos..end))?;

        let row = &self.rows[pos];
        let id = row.id.clone();
        let request = TransferRequest {
            source_table: &self.name,
            dest_table: &self.name,
            same_table: true,
            node: &id,
            level: row.level,
            children_count: row.children_count,
            target: &target,
        };
        let mode = self.decide(&request);
        if mode == TransferMode::Reject {
            tracing::debug!(parent: self.log.span(), "move of {} rejected", id);
            return Ok(TransferOutcome::Rejected);
        }

        self.prepare_target(&target)?;
        let pos = self.position(&id)?;
        let old_parent = self.rows[pos].parent.clone();
        let parent_expanded = match &old_parent {
            Some(parent) => self.rows[self.position(parent)?].expanded,
            None => false,
        };
        let mut block = self.take_block(pos)?;
        // Taking an only child collapses its parent; undo that when the row goes back under it
        if parent_expanded && old_parent == target.parent {
            if let Some(parent) = &old_parent {
                let parent_pos = self.position(parent)?;
                self.rows[parent_pos].expanded = true;
            }
        }
        if mode == TransferMode::RowOnly {
            // A loaded row keeps its loaded flag and becomes a known leaf
            block.truncate(1);
            let row = &mut block[0];
            row.children_count = 0;
            row.expanded = false;
        }

        let rows = block.len();
        let handle = self.place_block(&target, block)?;
        tracing::debug!(
            parent: self.log.span(),
            "moved {} ({} rows) to position {}",
            id,
            rows,
            handle.position
        );
        Ok(TransferOutcome::Transferred { handle, rows })
    }

    /// Drag a row into another table, removing it here.
    ///
    /// `transform` builds the destination row from each source row that is
    /// taken along.
    pub fn transfer_to<D>(
        &mut self,
        dest: &mut TreeTable<D>,
        node: impl Into<NodeRef>,
        target: DropTarget,
        transform: impl FnMut(&Row<C>) -> NewRow<D>,
    ) -> Result<TransferOutcome, TreeTableError> {
        self.materialize_into(dest, node.into(), target, transform, true)
    }

    /// Like [`transfer_to`](Self::transfer_to) but the source rows stay
    pub fn copy_to<D>(
        &mut self,
        dest: &mut TreeTable<D>,
        node: impl Into<NodeRef>,
        target: DropTarget,
        transform: impl FnMut(&Row<C>) -> NewRow<D>,
    ) -> Result<TransferOutcome, TreeTableError> {
        self.materialize_into(dest, node.into(), target, transform, false)
    }

    fn materialize_into<D>(
        &mut self,
        dest: &mut TreeTable<D>,
        node: NodeRef,
        target: DropTarget,
        mut transform: impl FnMut(&Row<C>) -> NewRow<D>,
        remove_source: bool,
    ) -> Result<TransferOutcome, TreeTableError> {
        let pos = self.resolve(&node)?;
        dest.validate_target(&target, None)?;

        let source = &self.rows[pos];
        let request = TransferRequest {
            source_table: &self.name,
            dest_table: &dest.name,
            same_table: false,
            node: &source.id,
            level: source.level,
            children_count: source.children_count,
            target: &target,
        };
        let mode = dest.decide(&request);
        if mode == TransferMode::Reject {
            tracing::debug!(
                parent: dest.log.span(),
                "drop of {} from {} rejected",
                source.id,
                self.name
            );
            return Ok(TransferOutcome::Rejected);
        }

        dest.prepare_target(&target)?;

        let end = match mode {
            TransferMode::RowOnly => pos + 1,
            _ => self.block_end(pos),
        };
        let mut renamed: HashMap<&NodeId, NodeId> = HashMap::new();
        let mut block: Vec<Row<D>> = Vec::with_capacity(end - pos);
        for src in &self.rows[pos..end] {
            let parent = src.parent.as_ref().and_then(|p| renamed.get(p)).cloned();
            let mut row = Row::from_new(transform(src), parent, src.level);
            if mode == TransferMode::WholeSubtree {
                row.children_count = src.children_count;
                row.children_loaded = src.children_loaded;
                row.expanded = src.expanded;
            }
            renamed.insert(&src.id, row.id.clone());
            block.push(row);
        }
        dest.check_new_ids(block.iter().map(|r| &r.id))?;

        let source_id = self.rows[pos].id.clone();
        if remove_source {
            self.take_block(pos)?;
        }

        let rows = block.len();
        let handle = dest.place_block(&target, block)?;
        tracing::debug!(
            parent: dest.log.span(),
            "received {} as {} ({} rows) from {}",
            source_id,
            handle.id,
            rows,
            self.name
        );
        Ok(TransferOutcome::Transferred { handle, rows })
    }
}
