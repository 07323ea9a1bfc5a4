// Tree-table engine
//
// Renders a hierarchy as one flat, ordered list of rows in which every row's
// descendants form a contiguous block right after it. Children are fetched
// lazily through a caller-supplied loader the first time a row is expanded,
// and rows can be dragged within a table or across tables under a
// pluggable transfer policy.

pub mod columns;
pub mod node;
pub mod table;
pub mod transfer;

pub use columns::{indent_for, ColumnError, ColumnLayout};
pub use node::{NewRow, NodeId, NodeRef, Row, RowHandle, RowState};
pub use table::{Loader, TreeTable};
pub use transfer::{DropTarget, TransferMode, TransferOutcome, TransferPolicy, TransferRequest};

use std::fmt;

/// Tree-table failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeTableError {
    /// No row with this id in the table
    NodeNotFound(NodeId),
    /// A child count would go below zero; indicates a bookkeeping bug
    NegativeChildCount(NodeId),
    /// A callback the operation needs was never installed
    MissingCallback(&'static str),
    /// A loader or transform produced a row without a required field
    MissingField(&'static str),
    /// The id is already used by another row of the table
    DuplicateNodeId(NodeId),
    /// The drop location cannot receive the row
    InvalidDropTarget(String),
}

impl fmt::Display for TreeTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeTableError::NodeNotFound(id) => write!(f, "node not found: {id}"),
            TreeTableError::NegativeChildCount(id) => {
                write!(f, "children count of {id} would become negative")
            }
            TreeTableError::MissingCallback(name) => write!(f, "no {name} callback installed"),
            TreeTableError::MissingField(name) => write!(f, "row is missing field '{name}'"),
            TreeTableError::DuplicateNodeId(id) => write!(f, "duplicate node id: {id}"),
            TreeTableError::InvalidDropTarget(msg) => write!(f, "invalid drop target: {msg}"),
        }
    }
}

impl std::error::Error for TreeTableError {}
