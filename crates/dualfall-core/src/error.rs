//! Error types for the simulation.
//!
//! Gameplay rejections (conflicts and collisions) are not errors; they are
//! reported through [`crate::Outcome`]. The types here cover bad caller input
//! and broken bookkeeping.

use thiserror::Error;

use crate::{GroupId, Polarity, ShapeId};

/// Errors returned by simulation commands and constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error("invalid grid size {width}x{height}: {reason}")]
    InvalidSize {
        width: usize,
        height: usize,
        reason: &'static str,
    },

    #[error("no active shape with id {0}")]
    UnknownShape(ShapeId),

    #[error("no figure named {0:?} in the catalog")]
    UnknownFigure(String),

    #[error("invalid figure outline: {0}")]
    InvalidOutline(&'static str),

    #[error("figure {name:?} does not fit the grid at spawn row {spawn_row}")]
    FigureDoesNotFit { name: String, spawn_row: i32 },

    #[error("{0} leaves no room to allocate further shape ids")]
    ShapeIdOverflow(ShapeId),

    #[error(transparent)]
    Parse(#[from] ParseGridError),

    #[error("state failed validation: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// A breach of the grid/ledger bookkeeping. These indicate a bug upstream
/// rather than a gameplay event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("grid holds {found} cells but its size needs {expected}")]
    GridLength { expected: usize, found: usize },

    #[error("{group} references cell {index} outside 0..{cell_count}")]
    IndexOutOfRange {
        group: GroupId,
        index: usize,
        cell_count: usize,
    },

    #[error("cell {index} is claimed by both {first} and {second}")]
    DuplicateIndex {
        index: usize,
        first: GroupId,
        second: GroupId,
    },

    #[error("cell {index} belongs to no group")]
    Unclaimed { index: usize },

    #[error("cell {index} of {group} holds polarity {found}")]
    PolarityMismatch {
        index: usize,
        group: GroupId,
        found: Polarity,
    },

    #[error("{0} has no cells")]
    EmptyShape(ShapeId),
}

/// Failure to read a grid fixture or a polarity value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseGridError {
    #[error("unknown cell symbol {0:?}")]
    UnknownSymbol(char),

    #[error("expected {expected} cells, found {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("polarity must be 0 or 1, got {0}")]
    InvalidPolarity(u8),
}
