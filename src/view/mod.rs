//! View layer
//!
//! Presentation-side components that turn model data into rows.

pub mod tree_table;
