//! Error types.

use thiserror::Error;

/// Errors returned by `Session` commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A selected position lies outside the grid.
    #[error("Position ({row}, {col}) is outside the {size}x{size} grid")]
    OutOfBounds { row: usize, col: usize, size: usize },

    /// `run_until_idle` executed its step budget without draining the scheduler.
    #[error("Cascade did not settle within {steps} steps")]
    CascadeLimit { steps: usize },
}

/// Errors produced when parsing a grid from text rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid number of rows. Expected at most {expected}, found {found}")]
    TooManyRows { expected: usize, found: usize },

    #[error("Row {row} is too long. Expected at most {expected} characters, found {found}")]
    RowTooLong {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unrecognized character '{ch}' in row {row} col {col}")]
    UnrecognizedChar { ch: char, row: usize, col: usize },
}
