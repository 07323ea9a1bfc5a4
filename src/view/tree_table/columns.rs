//! Column widths of a tree table

use crate::config::TableOptions;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// The column is the last one, so it has no border to drag
    NoRightNeighbor(usize),
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnError::NoRightNeighbor(column) => {
                write!(f, "column {column} has no right neighbor")
            }
        }
    }
}

impl std::error::Error for ColumnError {}

/// Horizontal offset of a row's content in the expander column
pub fn indent_for(level: usize, options: &TableOptions) -> u32 {
    level as u32 * options.indent + options.expander_size
}

/// Widths of the table's columns, each kept at or above `min_width`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    widths: Vec<u32>,
    min_width: u32,
}

impl ColumnLayout {
    pub fn new(widths: Vec<u32>, min_width: u32) -> Self {
        let widths = widths.into_iter().map(|w| w.max(min_width)).collect();
        Self { widths, min_width }
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    pub fn total(&self) -> u32 {
        self.widths.iter().sum()
    }

    /// Move the border to the right of `column` by `delta`.
    ///
    /// The right neighbor absorbs the change. The delta is clamped so neither
    /// column shrinks below the minimum; returns the delta actually applied.
    pub fn resize(&mut self, column: usize, delta: i64) -> Result<i64, ColumnError> {
        if column + 1 >= self.widths.len() {
            return Err(ColumnError::NoRightNeighbor(column));
        }

        let left = i64::from(self.widths[column]);
        let right = i64::from(self.widths[column + 1]);
        let min = i64::from(self.min_width);
        let applied = delta.clamp(min - left, right - min);

        self.widths[column] = (left + applied) as u32;
        self.widths[column + 1] = (right - applied) as u32;
        Ok(applied)
    }

    /// Scale widths proportionally so they add up to `total_width`.
    ///
    /// Rounding leftovers go to the last column. Columns are never narrower
    /// than the minimum, so a tiny `total_width` may be exceeded.
    pub fn fit(&mut self, total_width: u32) {
        let current = u64::from(self.total());
        if current == 0 || self.widths.is_empty() {
            return;
        }

        for w in &mut self.widths {
            *w = (u64::from(*w) * u64::from(total_width) / current) as u32;
        }
        let leftover = total_width.saturating_sub(self.total());
        if let Some(last) = self.widths.last_mut() {
            *last += leftover;
        }
        for w in &mut self.widths {
            *w = (*w).max(self.min_width);
        }
    }
}
