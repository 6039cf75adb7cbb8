//! Error types for the tracker core.

use std::path::PathBuf;

use thiserror::Error;

/// A rejected mutation. Every variant is recoverable; the table state the
/// caller observed before the operation is still intact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("weekly frequency must be greater than zero, got {0}")]
    NonPositiveFrequency(i64),

    #[error("`{0}` is not a recognizable calendar date")]
    UnparsableDate(String),

    #[error("a habit named `{0}` already exists")]
    DuplicateName(String),

    #[error("no habit named `{0}`")]
    UnknownHabit(String),

    #[error("no habit with id {0}")]
    UnknownHabitId(usize),

    #[error("no instance with id {0}")]
    UnknownInstanceId(usize),

    #[error("row is missing the `{column}` column")]
    MissingColumn { column: String },

    #[error("`{value}` is not a valid `{column}` value")]
    BadCell { column: String, value: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("`{}` does not end in .csv", .0.display())]
    NotCsv(PathBuf),

    #[error("`{}` not found", .0.display())]
    NotFound(PathBuf),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt data at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("cell ({row}, {col}) is outside a {rows}x{cols} table")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}
