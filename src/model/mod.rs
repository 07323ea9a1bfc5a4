//! Core data model
//!
//! Pure data structures: the path-keyed tree and the watchable registry built on it.

pub mod datastore;
pub mod path_tree;
